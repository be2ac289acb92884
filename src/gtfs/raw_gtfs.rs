use crate::gtfs::error::{Error, LineError};
use crate::gtfs::table::Table;

use std::{fs::File, io::Read, path::Path, time::Instant};

const BOM: [u8; 3] = [0xef, 0xbb, 0xbf];

/// The GTFS tables needed to derive pattern stops, as loose tables.
/// https://gtfs.org/documentation/schedule/reference/#dataset-files
#[derive(Debug, Clone)]
pub struct GtfsTables {
    pub routes: Table,
    pub trips: Table,
    pub stops: Table,
    pub stop_times: Table,
}

impl GtfsTables {
    /// Reads a feed from a directory or from a zip archive.
    pub fn from_path<P>(path: P) -> Result<GtfsTables, Error>
    where
        P: AsRef<Path>,
    {
        let start = Instant::now();
        let p = path.as_ref();
        let tables = if p.is_file() {
            GtfsTables::read_from_zip(p)?
        } else if p.is_dir() {
            GtfsTables::read_from_dir(p)?
        } else {
            return Err(Error::NotFileNorDirectory(format!("{}", p.display())));
        };
        log::debug!(
            "GTFS {} loaded in {}ms",
            p.display(),
            start.elapsed().as_millis()
        );
        Ok(tables)
    }

    fn read_from_dir(path: &Path) -> Result<GtfsTables, Error> {
        Ok(GtfsTables {
            routes: GtfsTables::read_table_from_path(path, "routes.txt")?,
            trips: GtfsTables::read_table_from_path(path, "trips.txt")?,
            stops: GtfsTables::read_table_from_path(path, "stops.txt")?,
            stop_times: GtfsTables::read_table_from_path(path, "stop_times.txt")?,
        })
    }

    fn read_from_zip(path: &Path) -> Result<GtfsTables, Error> {
        let file = File::open(path).map_err(|e| Error::NamedFileIO {
            file_name: format!("{}", path.display()),
            source: Box::new(e),
        })?;
        let mut archive = zip::ZipArchive::new(file)?;
        Ok(GtfsTables {
            routes: GtfsTables::read_table_from_zip(&mut archive, "routes.txt")?,
            trips: GtfsTables::read_table_from_zip(&mut archive, "trips.txt")?,
            stops: GtfsTables::read_table_from_zip(&mut archive, "stops.txt")?,
            stop_times: GtfsTables::read_table_from_zip(&mut archive, "stop_times.txt")?,
        })
    }

    fn read_table_from_path(path: &Path, file_name: &str) -> Result<Table, Error> {
        let p = path.join(file_name);
        if p.exists() {
            File::open(p)
                .map_err(|e| Error::NamedFileIO {
                    file_name: file_name.to_owned(),
                    source: Box::new(e),
                })
                .and_then(|r| read_table(r, file_name))
        } else {
            Err(Error::MissingFile(file_name.to_owned()))
        }
    }

    fn read_table_from_zip(
        archive: &mut zip::ZipArchive<File>,
        file_name: &str,
    ) -> Result<Table, Error> {
        // Feeds are sometimes zipped with an enclosing folder
        let suffix = format!("/{file_name}");
        let entry = archive
            .file_names()
            .find(|name| *name == file_name || name.ends_with(&suffix))
            .map(String::from)
            .ok_or_else(|| Error::MissingFile(file_name.to_owned()))?;
        let reader = archive.by_name(&entry)?;
        read_table(reader, file_name)
    }
}

/// Reads one CSV table, skipping a leading UTF-8 BOM.
pub fn read_table<T>(mut reader: T, file_name: &str) -> Result<Table, Error>
where
    T: Read,
{
    let mut bom = [0; 3];
    reader
        .read_exact(&mut bom)
        .map_err(|e| Error::NamedFileIO {
            file_name: file_name.to_owned(),
            source: Box::new(e),
        })?;

    let prefix: &[u8] = if bom != BOM { &bom } else { &[] };
    let chained = prefix.chain(reader);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(chained);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::CSVError {
            file_name: file_name.to_owned(),
            source: e,
            line_in_error: None,
        })?
        .iter()
        .map(|x| x.trim().to_owned())
        .collect();

    let mut rec = csv::StringRecord::new();
    let mut rows = Vec::new();
    while reader.read_record(&mut rec).map_err(|e| Error::CSVError {
        file_name: file_name.to_owned(),
        source: e,
        line_in_error: None,
    })? {
        // Trailing empty cells are tolerated, anything else past the header is not
        if rec.iter().skip(headers.len()).any(|v| !v.trim().is_empty()) {
            return Err(Error::InvalidRow {
                file_name: file_name.to_owned(),
                line: rec.position().map(|p| p.line()).unwrap_or_default(),
                line_in_error: LineError {
                    headers: headers.clone(),
                    values: rec.iter().map(String::from).collect(),
                },
            });
        }
        rows.push(rec.iter().take(headers.len()).map(String::from).collect());
    }
    Ok(Table::from_text(headers, rows))
}
