use serde_json::{Map, Value};
use tokio::{
    fs::File,
    io::{self, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWriteExt},
};
use tracing::warn;

/// Reads a JSON object from the start of `file`. Empty or corrupted content is treated as an
/// empty object, which can happen after a shutdown cut a write short.
pub async fn read_json_object(
    file: &mut (impl AsyncSeek + AsyncRead + Unpin),
) -> Result<Map<String, Value>, io::Error> {
    file.rewind().await?;
    let mut content = String::new();
    file.read_to_string(&mut content).await?;

    if content.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Map<String, Value>>(&content) {
        Ok(v) => Ok(v),
        Err(e) => {
            warn!("Found illegal json object in storage, starting from an empty one: {e}");
            Ok(Map::new())
        }
    }
}

/// Replaces the whole content of `file` with `bytes`.
pub async fn overwrite_contents(file: &mut File, bytes: &[u8]) -> Result<(), io::Error> {
    file.set_len(0).await?;
    file.rewind().await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempfile;
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    use super::{overwrite_contents, read_json_object};

    #[tokio::test]
    async fn test_read_json_object_basic() -> Result<()> {
        let mut file = tempfile()?;
        file.write_all(br#"{"settings": {"darkMode": true}}"#)?;
        let mut file = tokio::fs::File::from_std(file);

        let object = read_json_object(&mut file).await?;

        assert_eq!(object.get("settings"), Some(&json!({"darkMode": true})));
        Ok(())
    }

    #[tokio::test]
    async fn test_read_json_object_empty() -> Result<()> {
        let mut file = tokio::fs::File::from_std(tempfile()?);
        assert!(read_json_object(&mut file).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_read_json_object_corrupted() -> Result<()> {
        let mut file = tempfile()?;
        file.write_all(br#"{"activityLog": [{"type": "mo"#)?;
        let mut file = tokio::fs::File::from_std(file);

        assert!(read_json_object(&mut file).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_overwrite_shrinks_file() -> Result<()> {
        let mut file = tempfile()?;
        file.write_all(b"a much longer previous content")?;
        let mut file = tokio::fs::File::from_std(file);

        overwrite_contents(&mut file, b"{}").await?;

        file.rewind().await?;
        let mut s = String::new();
        file.read_to_string(&mut s).await?;
        assert_eq!(s, "{}");
        Ok(())
    }
}
