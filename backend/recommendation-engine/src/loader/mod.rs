//! MovieLens file loading
//!
//! - `u.data`: `user_id \t item_id \t rating \t unix_timestamp`
//! - `u.item`: `item_id | title | release | video release | url | genre flags...`
//!
//! Neither file has a header row. `u.item` is Latin-1 encoded and decoded byte
//! for byte; quote characters in titles are literal.

use crate::error::{RecommendError, Result};
use crate::models::{ItemMetadata, Rating};
use crate::services::RatingStore;
use chrono::{NaiveDate, TimeZone, Utc};
use csv::{ByteRecord, ReaderBuilder, Trim};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

const RATING_DELIMITER: u8 = b'\t';
const ITEM_DELIMITER: u8 = b'|';
const RELEASE_DATE_FORMAT: &str = "%d-%b-%Y";

/// One `u.data` row, by position
#[derive(Debug, Deserialize)]
struct RatingRecord {
    user_id: u32,
    item_id: u32,
    score: u8,
    timestamp: i64,
}

/// Build a rating store from a `u.data` and a `u.item` file
pub fn load_store(ratings_path: impl AsRef<Path>, items_path: impl AsRef<Path>) -> Result<RatingStore> {
    let items = load_items(items_path)?;
    let ratings = load_ratings(ratings_path)?;
    Ok(RatingStore::new(ratings, items))
}

pub fn load_ratings(path: impl AsRef<Path>) -> Result<Vec<Rating>> {
    let path = path.as_ref();
    let ratings = parse_ratings(File::open(path)?)?;
    info!(path = %path.display(), count = ratings.len(), "Loaded ratings");
    Ok(ratings)
}

pub fn load_items(path: impl AsRef<Path>) -> Result<Vec<ItemMetadata>> {
    let path = path.as_ref();
    let items = parse_items(File::open(path)?)?;
    info!(path = %path.display(), count = items.len(), "Loaded items");
    Ok(items)
}

pub fn parse_ratings<R: Read>(reader: R) -> Result<Vec<Rating>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(RATING_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut ratings = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let line_no = line_of(&record);

        if record.len() != 4 {
            return Err(parse_error(line_no, format!("expected 4 fields, found {}", record.len())));
        }

        let row: RatingRecord = record
            .deserialize(None)
            .map_err(|e| parse_error(line_no, e.to_string()))?;
        if row.score == 0 {
            return Err(parse_error(line_no, "rating must be positive".to_string()));
        }

        let timestamp = Utc
            .timestamp_opt(row.timestamp, 0)
            .single()
            .ok_or_else(|| parse_error(line_no, format!("timestamp out of range: {}", row.timestamp)))?;

        ratings.push(Rating {
            user_id: row.user_id,
            item_id: row.item_id,
            score: row.score,
            timestamp,
        });
    }

    Ok(ratings)
}

pub fn parse_items<R: Read>(reader: R) -> Result<Vec<ItemMetadata>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(ITEM_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let mut items = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let line_no = line_of(&record);

        if record.len() < 2 {
            return Err(parse_error(line_no, format!("expected at least 2 fields, found {}", record.len())));
        }

        let field = |idx: usize| record.get(idx).map(latin1);

        let item_id = parse_field::<u32>(latin1(&record[0]).trim(), "item_id", line_no)?;
        let release = parse_date(field(2), line_no)?;
        let video_release = parse_date(field(3), line_no)?;
        let url = field(4)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let genres = record
            .iter()
            .skip(5)
            .map(|flag| latin1(flag).trim() == "1")
            .collect();

        items.push(ItemMetadata {
            item_id,
            title: latin1(&record[1]),
            release,
            video_release,
            url,
            genres,
        });
    }

    Ok(items)
}

/// ISO-8859-1 maps every byte to the code point of the same value
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn line_of(record: &ByteRecord) -> usize {
    record.position().map_or(0, |pos| pos.line() as usize)
}

fn parse_field<T: FromStr>(value: &str, name: &str, line: usize) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| parse_error(line, format!("invalid {}: {:?}", name, value)))
}

fn parse_date(value: Option<String>, line: usize) -> Result<Option<NaiveDate>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.trim() {
        "" => Ok(None),
        s => NaiveDate::parse_from_str(s, RELEASE_DATE_FORMAT)
            .map(Some)
            .map_err(|e| parse_error(line, format!("invalid date {:?}: {}", s, e))),
    }
}

fn parse_error(line: usize, reason: String) -> RecommendError {
    RecommendError::Parse { line, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const U_DATA: &str = "196\t242\t3\t881250949\n186\t302\t3\t891717742\n\n22\t377\t1\t878887116\n";

    #[test]
    fn test_parse_ratings() {
        let ratings = parse_ratings(Cursor::new(U_DATA)).unwrap();

        assert_eq!(ratings.len(), 3);
        assert_eq!(ratings[0].user_id, 196);
        assert_eq!(ratings[0].item_id, 242);
        assert_eq!(ratings[0].score, 3);
        assert_eq!(ratings[0].timestamp.timestamp(), 881250949);
        assert_eq!(ratings[2].score, 1);
    }

    #[test]
    fn test_parse_ratings_rejects_malformed_lines() {
        let err = parse_ratings(Cursor::new("1\t2\t3\n")).unwrap_err();
        assert!(matches!(err, RecommendError::Parse { line: 1, .. }));

        let err = parse_ratings(Cursor::new("1\t2\t3\t100\nx\t2\t3\t100\n")).unwrap_err();
        assert!(matches!(err, RecommendError::Parse { line: 2, .. }));

        let err = parse_ratings(Cursor::new("1\t2\t0\t100\n")).unwrap_err();
        assert!(matches!(err, RecommendError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_parse_items() {
        let data = "1|Toy Story (1995)|01-Jan-1995||http://us.imdb.com/M/title-exact?Toy%20Story%20(1995)|0|0|0|1|1\n\
                    267|unknown||||1|0|0|0|0\n";
        let items = parse_items(Cursor::new(data)).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_id, 1);
        assert_eq!(items[0].title, "Toy Story (1995)");
        assert_eq!(items[0].release, NaiveDate::from_ymd_opt(1995, 1, 1));
        assert_eq!(items[0].video_release, None);
        assert!(items[0].url.is_some());
        assert_eq!(items[0].genres, vec![false, false, false, true, true]);
        assert_eq!(items[1].release, None);
        assert_eq!(items[1].url, None);
    }

    #[test]
    fn test_parse_items_latin1_title() {
        let mut data = b"1|Caf".to_vec();
        data.push(0xE9);
        data.extend_from_slice(b" (1999)|01-Jan-1999||||0\n");

        let items = parse_items(Cursor::new(data)).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Caf\u{e9} (1999)");
    }

    #[test]
    fn test_parse_items_keeps_quotes_in_titles() {
        let data = "1|\"Great Race, The\" (1965)|01-Jan-1965||||0\r\n2|Heat (1995)|01-Jan-1995||||0\r\n";
        let items = parse_items(Cursor::new(data)).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "\"Great Race, The\" (1965)");
        assert_eq!(items[1].title, "Heat (1995)");
        assert_eq!(items[1].genres, vec![false]);
    }

    #[test]
    fn test_parse_ratings_reports_line_after_blank_lines() {
        let err = parse_ratings(Cursor::new("1\t2\t3\t100\n\n1\t2\tfive\t100\n")).unwrap_err();
        assert!(matches!(err, RecommendError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_parse_items_rejects_bad_date() {
        let err = parse_items(Cursor::new("1|Title|1995-01-01||||0\n")).unwrap_err();
        assert!(matches!(err, RecommendError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_load_store_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("u.data");
        let item_path = dir.path().join("u.item");

        File::create(&data_path)
            .unwrap()
            .write_all(b"1\t10\t5\t881250949\n2\t10\t4\t881250950\n")
            .unwrap();
        File::create(&item_path)
            .unwrap()
            .write_all(b"10|Ten|01-Jan-1995||||0\n11|Eleven|||||0\n")
            .unwrap();

        let store = load_store(&data_path, &item_path).unwrap();
        assert_eq!(store.num_users(), 2);
        assert_eq!(store.num_items(), 2);
        assert_eq!(store.item(11).map(|i| i.title.as_str()), Some("Eleven"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load_ratings("/nonexistent/u.data").unwrap_err();
        assert!(matches!(err, RecommendError::Io(_)));
    }
}
