use tokio::process::Command;

use crate::error::HostError;

/// Hands `url` to the platform's default handler without waiting for it.
pub(crate) fn open_url(url: &str) -> Result<(), HostError> {
    #[cfg(target_os = "windows")]
    let result = Command::new("cmd").args(["/C", "start", "", url]).spawn();

    #[cfg(target_os = "macos")]
    let result = Command::new("open").arg(url).spawn();

    #[cfg(all(unix, not(target_os = "macos")))]
    let result = Command::new("xdg-open").arg(url).spawn();

    result.map(|_| ()).map_err(|err| HostError::Opener {
        url: url.to_string(),
        detail: err.to_string(),
    })
}
