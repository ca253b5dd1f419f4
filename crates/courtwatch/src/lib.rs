pub mod calendar;
pub mod config;
pub mod holidays;
pub mod navigator;
pub mod notify;
pub mod pager;
pub mod parser;
mod readiness;
pub mod report;
pub mod scanner;
pub mod session;
pub mod types;
pub mod wait;

pub use calendar::{HolidayCalendar, HolidayTable};
pub use config::{ConfigError, ScanConfig};
pub use holidays::JapaneseHolidays;
pub use notify::{Dispatcher, GmailSender, LogSender, MailError, MailSender};
pub use report::ScanReport;
pub use scanner::{HitSink, ScanError, Scanner};
pub use session::{BrowserOptions, SessionError, WebDriverSession, WebSession};

pub(crate) const BASE_URL: &str = "https://kouen.sports.metro.tokyo.lg.jp/web/";
