use {
    anyhow::{Context, Result},
    log::{LevelFilter, Log, Metadata, Record},
    std::{
        fmt,
        fs::{self, File, OpenOptions},
        io::{self, Write},
        path::{Path, PathBuf},
        sync::Mutex,
        time::{SystemTime, UNIX_EPOCH},
    },
};

// environment variable that overrides the maximum log level
pub const LOG_LEVEL_VAR: &str = "MJPEGPROXY_LOG";

const SECS_PER_DAY: u64 = 86_400;

/// Wall-clock time in UTC, to the second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UtcTime {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl UtcTime {
    pub fn now() -> Self {
        // a clock before 1970 logs as the epoch
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |since| since.as_secs());
        Self::from_unix(secs)
    }

    /// Split seconds since the Unix epoch into a civil date and time.
    pub fn from_unix(secs: u64) -> Self {
        // Howard Hinnant's days-to-civil, http://howardhinnant.github.io/date_algorithms.html
        let days = (secs / SECS_PER_DAY) as i64 + 719_468;
        let era = days.div_euclid(146_097);
        let day_of_era = days.rem_euclid(146_097) as u32;
        let year_of_era =
            (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
        let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
        let shifted_month = (5 * day_of_year + 2) / 153;
        let month = if shifted_month < 10 {
            shifted_month + 3
        } else {
            shifted_month - 9
        };
        let year = year_of_era as i64 + era * 400 + i64::from(month <= 2);

        let secs_of_day = (secs % SECS_PER_DAY) as u32;
        Self {
            year,
            month,
            day: day_of_year - (153 * shifted_month + 2) / 5 + 1,
            hour: secs_of_day / 3600,
            minute: secs_of_day % 3600 / 60,
            second: secs_of_day % 60,
        }
    }

    /// `YYYY-MM-DD`, the name of the log file for this day.
    pub fn date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}T{:02}:{:02}:{:02}",
            self.date(),
            self.hour,
            self.minute,
            self.second
        )
    }
}

/// Write `record` as one `TIMESTAMP [LEVEL] [thread:ID] file:line - message` line.
pub fn write_record(out: &mut impl Write, record: &Record) -> io::Result<()> {
    writeln!(
        out,
        "{} [{}] [thread:{:?}] {}:{} - {}",
        UtcTime::now(),
        record.level(),
        std::thread::current().id(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        record.args()
    )
}

/// Logger that prints every record to stdout.
pub struct StdoutLogger;

impl Log for StdoutLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let _ = write_record(&mut io::stdout().lock(), record);
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

// the file records of one UTC day go to
struct DayFile {
    date: String,
    file: File,
}

impl DayFile {
    fn open(dir: &Path, date: String) -> Result<Self> {
        let path = dir.join(format!("{}.log", date));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        Ok(Self { date, file })
    }
}

/// Logger that appends to one `YYYY-MM-DD.log` file per UTC day in a directory.
pub struct FileLogger {
    dir: PathBuf,
    current: Mutex<DayFile>,
}

impl FileLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create log directory {}", dir.display()))?;
        let current = DayFile::open(&dir, UtcTime::now().date())?;
        Ok(Self {
            dir,
            current: Mutex::new(current),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Log for FileLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        let today = UtcTime::now().date();
        if today != current.date {
            // keep writing to the old day if the new file cannot be opened
            match DayFile::open(&self.dir, today) {
                Ok(next) => *current = next,
                Err(error) => eprintln!("{:#}", error),
            }
        }

        if let Err(error) = write_record(&mut current.file, record) {
            eprintln!("cannot write to log file: {}", error);
            let _ = write_record(&mut io::stderr(), record);
        }
    }

    fn flush(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        let _ = current.file.flush();
    }
}

/// `Debug` in debug builds, `Info` in release builds.
pub fn default_max_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Parse a level name such as `warn` or `TRACE`, falling back to the build default.
pub fn parse_max_level(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or_else(default_max_level)
}

// first logger wins, later installs are ignored
fn install(logger: &'static dyn Log) {
    if log::set_logger(logger).is_ok() {
        log::set_max_level(parse_max_level(
            std::env::var(LOG_LEVEL_VAR).ok().as_deref(),
        ));
    }
}

/// Log to stdout.
pub fn init_stdout_logger() {
    static LOGGER: StdoutLogger = StdoutLogger;
    install(&LOGGER);
}

/// Log into date-named files in `dir`, creating it if needed.
pub fn init_file_logger(dir: impl Into<PathBuf>) -> Result<()> {
    let logger = FileLogger::new(dir)?;
    install(Box::leak(Box::new(logger)));
    Ok(())
}

/// Log into `dir` when given, to stdout otherwise.
pub fn init_logger(dir: Option<PathBuf>) -> Result<()> {
    match dir {
        Some(dir) => init_file_logger(dir),
        None => {
            init_stdout_logger();
            Ok(())
        }
    }
}

/// Log an error and exit the process with status 1.
#[macro_export]
macro_rules! log_fatal {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        {
            use std::io::Write;
            let _ = std::io::stdout().flush();
        }
        std::process::exit(1);
    }};
}
