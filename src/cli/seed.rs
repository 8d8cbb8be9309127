//! Synthetic syslog traffic for `init-db` and demos.

use chrono::{Duration, NaiveDateTime};

use crate::backend::sqlite::LogEntry;

const HOSTS: [&str; 4] = ["oasis", "web1", "web2", "db1"];

/// `(program, facility code, message templates)`.
const PROGRAMS: [(&str, u8, &[&str]); 5] = [
    (
        "sshd",
        10,
        &[
            "Accepted publickey for deploy from 10.0.4.{n} port 52{n} ssh2",
            "Connection closed by 10.0.9.{n} port 41{n} [preauth]",
        ],
    ),
    (
        "cron",
        15,
        &["(root) CMD (run-parts /etc/cron.hourly)", "(www) CMD (php jobs.php --batch {n})"],
    ),
    (
        "kernel",
        0,
        &[
            "eth0: link up, 1000Mbps, full-duplex",
            "Out of memory: Killed process {n} (worker)",
        ],
    ),
    (
        "postfix/smtpd",
        2,
        &["connect from unknown[192.0.2.{n}]", "lost connection after EHLO from mx{n}.example.net"],
    ),
    (
        "app",
        16,
        &[
            "request {n} served in 12ms",
            "unhandled error in request {n}\nTraceback (most recent call last):\n  File \"app.py\", line {n}, in handle\nValueError: bad input",
        ],
    ),
];

/// Seconds between consecutive synthetic records.
const SPACING_SECS: i64 = 7;

/// `count` records ending at `end`, oldest first.
#[must_use]
pub fn synthetic_entries(count: usize, end: NaiveDateTime) -> Vec<LogEntry> {
    (0..count)
        .map(|idx| {
            let (program, facility, templates) = PROGRAMS[idx % PROGRAMS.len()];
            let template = templates[(idx / PROGRAMS.len()) % templates.len()];
            let back = i64::try_from(count - idx).unwrap_or(i64::MAX / SPACING_SECS);
            LogEntry {
                datetime: end - Duration::seconds(back * SPACING_SECS),
                host: HOSTS[(idx / 3) % HOSTS.len()].to_string(),
                program: program.to_string(),
                facility,
                level: level_for(idx),
                pid: (facility != 0).then(|| 1000 + i64::try_from(idx % 9000).unwrap_or(0)),
                message: template.replace("{n}", &(idx % 250).to_string()),
            }
        })
        .collect()
}

/// Mostly info/notice traffic with occasional warnings and errors.
fn level_for(idx: usize) -> u8 {
    match idx % 17 {
        0 => 3,
        5 | 11 => 4,
        2 | 8 | 14 => 5,
        16 => 7,
        _ => 6,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn end() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    #[test]
    fn entries_are_chronological_and_end_before_now() {
        let entries = synthetic_entries(40, end());
        assert_eq!(entries.len(), 40);
        assert!(entries.windows(2).all(|w| w[0].datetime < w[1].datetime));
        assert!(entries.last().unwrap().datetime < end());
    }

    #[test]
    fn mix_includes_multiline_and_several_levels() {
        let entries = synthetic_entries(200, end());
        assert!(entries.iter().any(|e| e.message.contains('\n')));
        assert!(entries.iter().any(|e| e.level == 3));
        assert!(entries.iter().all(|e| e.level <= 7 && e.facility < 24));
        assert!(entries.iter().all(|e| !e.message.contains("{n}")));
    }

    #[test]
    fn zero_count_is_empty() {
        assert!(synthetic_entries(0, end()).is_empty());
    }
}
