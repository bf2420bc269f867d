use std::fmt::Formatter;

#[derive(Debug, Clone, PartialEq)]
pub enum PsxError {
    InvalidUrl(String),
    /// Parameter is the url that couldn't be reached
    NetworkError(String),
    Timeout(String),
    ErrorStatusCode {
        status_code: String,
        url: String,
    },
    /// Parameter is the landing page url
    DownloadControlNotFound(String),
    /// Parameter is the landing page url
    DownloadControlWithoutLink(String),
    /// Parameter is the path of the missing list file
    GameListNotFound(String),
    InvalidGameList(String),
    /// parameters are file path, additional error message
    FileOperationError {
        file_name: String,
        message: String,
    },
    Serialization(String),
    UnknownError(String),
}

impl std::fmt::Display for PsxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            PsxError::InvalidUrl(url) => format!("Invalid url received : {url}"),
            PsxError::NetworkError(err) => format!("error connecting to internet. {err}"),
            PsxError::Timeout(url) => format!("request timed out. {url}"),
            PsxError::ErrorStatusCode { status_code, url } => {
                format!("server returned an error response. {url} => {status_code}")
            }
            PsxError::DownloadControlNotFound(url) => {
                format!("no download button found on {url}")
            }
            PsxError::DownloadControlWithoutLink(url) => {
                format!("download button on {url} has no link")
            }
            PsxError::GameListNotFound(path) => format!("game list file {path} not found"),
            PsxError::InvalidGameList(err) => format!("game list is not valid. {err}"),
            PsxError::FileOperationError { file_name, message } => {
                format!("{message} : {file_name}")
            }
            PsxError::Serialization(err) => format!("error serializing results. {err}"),
            PsxError::UnknownError(err) => format!("an unknown error occurred. {err}"),
        };
        write!(f, "{str}")
    }
}

impl std::error::Error for PsxError {}

impl PsxError {
    /// Whether the error comes from talking to a server rather than from page content.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            PsxError::NetworkError(_) | PsxError::Timeout(_) | PsxError::ErrorStatusCode { .. }
        )
    }
}
