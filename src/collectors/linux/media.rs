//! Now-playing metadata over MPRIS (D-Bus session bus)

use crate::data::MediaInfo;
use crate::error::{DracError, DracErrorCode, Result};

#[cfg(feature = "nowplaying")]
pub fn now_playing() -> Result<MediaInfo> {
    use std::collections::HashMap;
    use zbus::blocking::fdo::DBusProxy;
    use zbus::blocking::{Connection, Proxy};
    use zbus::zvariant::{OwnedValue, Value};

    const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";

    // No session bus means no media-session service to ask
    let conn = Connection::session().map_err(|err| {
        DracError::new(
            DracErrorCode::NotSupported,
            format!("D-Bus session bus unavailable: {}", err),
        )
    })?;
    let names = DBusProxy::new(&conn)?.list_names()?;
    let player = names
        .iter()
        .map(|name| name.as_str())
        .find(|name| name.starts_with(MPRIS_PREFIX))
        .ok_or_else(|| DracError::new(DracErrorCode::NotFound, "no MPRIS media player running"))?;

    let proxy = Proxy::new(
        &conn,
        player,
        "/org/mpris/MediaPlayer2",
        "org.mpris.MediaPlayer2.Player",
    )?;
    let metadata: HashMap<String, OwnedValue> = proxy.get_property("Metadata")?;

    let text = |key: &str| -> Option<String> {
        let value = match &**metadata.get(key)? {
            Value::Str(s) => Some(s.as_str().to_string()),
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Str(s) => Some(s.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(joined)
            }
            _ => None,
        };
        value.filter(|s| !s.is_empty())
    };

    Ok(MediaInfo {
        title: text("xesam:title"),
        artist: text("xesam:artist"),
        album: text("xesam:album"),
    })
}

#[cfg(not(feature = "nowplaying"))]
pub fn now_playing() -> Result<MediaInfo> {
    Err(DracError::new(
        DracErrorCode::NotSupported,
        "built without now-playing support",
    ))
}
