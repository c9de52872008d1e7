use std::io;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "IO error: {}", _0)]
    IO(io::Error),

    #[fail(display = "Unknown protocol: {}", _0)]
    UnknownProtocol(String),

    #[fail(display = "Invalid directive: {}", _0)]
    InvalidDirective(String),

    #[fail(display = "Check configuration file: {}", _0)]
    EmptyConfig(String),
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::IO(error)
    }
}

impl Error {
    /// OS error number suitable for a process exit code.
    pub fn os_code(&self) -> i32 {
        match self {
            Error::IO(err) => err.raw_os_error().unwrap_or(1),
            _ => 1,
        }
    }
}
