use crate::prelude::*;

use super::EventHandler;
use ::csv::Writer;
use std::path::{Path, PathBuf};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

const NAME: &str = "csv";

/// Appends samples to a CSV file.
///
/// A header row is written before the first row and again whenever the
/// column set of a sample differs from the previous one.
#[derive(Debug)]
pub struct CsvHandler {
    path: PathBuf,
    file: Option<File>,
    columns: Vec<String>,
    rows: u64,
}

impl CsvHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            columns: Vec::new(),
            rows: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn file(&mut self) -> Result<&mut File, Error> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| Self::io_error(&self.path, e))?;
            debug!("csv output {} opened", self.path.display());
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| Error::consumer(NAME, "output file is not open"))
    }

    fn io_error(path: &Path, e: std::io::Error) -> Error {
        Error::consumer(NAME, format!("{}: {}", path.display(), e))
    }
}

/// Encodes one CSV record, terminator included.
fn record<I, T>(cells: I) -> Result<Vec<u8>, Error>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = Writer::from_writer(Vec::new());
    writer
        .write_record(cells)
        .map_err(|e| Error::consumer(NAME, e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| Error::consumer(NAME, e.to_string()))
}

#[async_trait]
impl EventHandler for CsvHandler {
    async fn handle(&mut self, sample: &Sample) -> Result<(), Error> {
        let mut chunk = Vec::new();
        if !sample.column_names().eq(self.columns.iter().map(String::as_str)) {
            self.columns = sample.column_names().map(str::to_string).collect();
            chunk.extend(record(&self.columns)?);
        }
        let values = sample.properties().iter().map(|p| p.value().to_string());
        chunk.extend(record(values)?);
        let path = self.path.clone();
        let file = self.file().await?;
        file.write_all(&chunk)
            .await
            .map_err(|e| Self::io_error(&path, e))?;
        file.flush().await.map_err(|e| Self::io_error(&path, e))?;
        self.rows += 1;
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<(), Error> {
        if let Some(file) = self.file.take() {
            file.sync_all()
                .await
                .map_err(|e| Self::io_error(&self.path, e))?;
        }
        info!("{} rows written to {}", self.rows, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(groups: Vec<(&str, Vec<Property>)>) -> Sample {
        let groups = groups
            .into_iter()
            .map(|(a, props)| (Address::from(a), props))
            .collect();
        Sample::new(Utc::now(), groups)
    }

    #[tokio::test]
    async fn test_header_written_on_column_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        let mut handler = CsvHandler::new(&path);
        let one = sample(vec![("mem://a", vec![Property::new("temp", 10_i64)])]);
        let two = sample(vec![
            ("mem://a", vec![Property::new("temp", 10_i64)]),
            ("mem://b", vec![Property::new("state", "up, stable")]),
        ]);
        handler.handle(&one).await.unwrap();
        handler.handle(&one).await.unwrap();
        handler.handle(&two).await.unwrap();
        handler.on_shutdown().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "timestamp,temp");
        assert!(lines[1].ends_with(",10"));
        assert_eq!(lines[3], "timestamp,mem://a:temp,mem://b:state");
        assert!(lines[4].ends_with(",10,\"up, stable\""));
    }

    #[test]
    fn test_record_quotes_only_when_needed() {
        let bytes = record(["plain", "a\"b", "x,y"]).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "plain,\"a\"\"b\",\"x,y\"\n");
    }

    #[tokio::test]
    async fn test_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        let one = sample(vec![("mem://a", vec![Property::new("temp", 10_i64)])]);
        for _ in 0..2 {
            let mut handler = CsvHandler::new(&path);
            handler.handle(&one).await.unwrap();
            handler.on_shutdown().await.unwrap();
        }
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().filter(|l| *l == "timestamp,temp").count(), 2);
        assert_eq!(content.lines().count(), 4);
    }
}
