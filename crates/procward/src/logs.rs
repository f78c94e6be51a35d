use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// `<logs_folder>/<YYYY-MM-DD>-<base name of program>.log`, dated today.
///
/// The date is UTC, not local time, so on a host with a non-UTC offset a
/// process started near midnight logs to the file of the neighbouring day.
pub fn log_path(logs_folder: &Path, program: &str) -> PathBuf {
	logs_folder.join(log_file_name(program, unix_secs(SystemTime::now())))
}

pub fn log_file_name(program: &str, secs: u64) -> String {
	let (year, month, day, _, _, _) = secs_to_datetime(secs);
	format!("{:04}-{:02}-{:02}-{}.log", year, month, day, base_name(program))
}

/// Last path component of a program name, so `/usr/bin/sleep` logs as `sleep`.
pub fn base_name(program: &str) -> &str {
	let trimmed = program.trim_end_matches('/');
	if trimmed.is_empty() {
		return if program.is_empty() { "." } else { "/" };
	}
	trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// `YYYY-MM-DD HH:MM:SS`, UTC.
pub fn format_timestamp(time: SystemTime) -> String {
	let (y, m, d, h, min, s) = secs_to_datetime(unix_secs(time));
	format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s)
}

fn unix_secs(time: SystemTime) -> u64 {
	time.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

pub fn secs_to_datetime(secs: u64) -> (u32, u32, u32, u32, u32, u32) {
	let days = (secs / 86400) as i64;
	let time_of_day = secs % 86400;
	let hour = (time_of_day / 3600) as u32;
	let minute = ((time_of_day % 3600) / 60) as u32;
	let second = (time_of_day % 60) as u32;

	// civil-from-days
	let z = days + 719468;
	let era = if z >= 0 { z } else { z - 146096 } / 146097;
	let doe = (z - era * 146097) as u32;
	let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
	let y = yoe as i64 + era * 400;
	let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
	let mp = (5 * doy + 2) / 153;
	let d = doy - (153 * mp + 2) / 5 + 1;
	let m = if mp < 10 { mp + 3 } else { mp - 9 };
	let y = if m <= 2 { y + 1 } else { y };

	(y as u32, m, d, hour, minute, second)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[test]
	fn test_secs_to_datetime() {
		assert_eq!(secs_to_datetime(1771027200), (2026, 2, 14, 0, 0, 0));
		assert_eq!(secs_to_datetime(951782400 + 3661), (2000, 2, 29, 1, 1, 1));
		assert_eq!(secs_to_datetime(0), (1970, 1, 1, 0, 0, 0));
	}

	#[test]
	fn test_log_file_name() {
		assert_eq!(log_file_name("sleep", 1771027200), "2026-02-14-sleep.log");
		assert_eq!(log_file_name("/usr/bin/uname", 1771027200), "2026-02-14-uname.log");
	}

	#[test]
	fn test_base_name() {
		assert_eq!(base_name("sleep"), "sleep");
		assert_eq!(base_name("./bin/worker"), "worker");
		assert_eq!(base_name("dir/"), "dir");
		assert_eq!(base_name("/"), "/");
		assert_eq!(base_name(""), ".");
	}

	#[test]
	fn test_format_timestamp() {
		let t = UNIX_EPOCH + Duration::from_secs(1771027200 + 45296);
		assert_eq!(format_timestamp(t), "2026-02-14 12:34:56");
	}

	#[test]
	fn test_log_file_name_dates_in_utc() {
		// 2024-01-01 23:59:59 UTC and one second later
		assert_eq!(log_file_name("sleep", 1_704_153_599), "2024-01-01-sleep.log");
		assert_eq!(log_file_name("sleep", 1_704_153_600), "2024-01-02-sleep.log");
	}

	#[test]
	fn test_log_path_under_folder() {
		let path = log_path(Path::new("/tmp/logs"), "sleep");
		assert!(path.starts_with("/tmp/logs"));
		assert!(path.to_string_lossy().ends_with("-sleep.log"));
	}
}
