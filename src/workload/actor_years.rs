//! Movies per release year for one actor, as two chained MapReduce stages.
//!
//! Stage one joins the title and credit sources on the title id: the two
//! map functions tag their values with [`GroupedValue`], and
//! [`reduce_join`] emits one `actor|year\t1` fact per matching movie.
//! Stage two re-reads those facts and sums them per `actor|year`.

use crate::codec::{decode_count, encode_count, GroupedValue};
use crate::config::{JoinArgs, Reconciliation};
use crate::utils::{split_lines, string_from_bytes};
use crate::*;
use anyhow::{Context, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Column 0 of the title header line.
const TITLE_HEADER: &str = "tconst";
/// Null marker in the title dataset.
const NULL_FIELD: &str = "\\N";
const MOVIE: &str = "movie";
const TYPE_COLUMN: usize = 1;
const YEAR_COLUMN: usize = 5;

/// Parses a title line into `(id, year)` if it is a movie with a known year.
pub fn parse_title(line: &str) -> Option<(String, String)> {
    if line.is_empty() || line.starts_with(TITLE_HEADER) {
        return None;
    }
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() <= YEAR_COLUMN {
        return None;
    }
    let id = fields[0].trim();
    let kind = fields[TYPE_COLUMN].trim();
    let year = fields[YEAR_COLUMN].trim();
    if year == NULL_FIELD || year.is_empty() || kind != MOVIE {
        return None;
    }
    Some((id.to_string(), year.to_string()))
}

/// Parses a credit line into `(title id, name)` if the name is `actor`.
///
/// Only the first two commas separate fields; the name keeps any others.
pub fn parse_credit(line: &str, actor: &str) -> Option<(String, String)> {
    let mut fields = line.splitn(3, ',');
    let title_id = fields.next()?.trim();
    let _ordering = fields.next()?;
    let name = fields.next()?.trim();
    if title_id.is_empty() || name.is_empty() || name != actor {
        return None;
    }
    Some((title_id.to_string(), name.to_string()))
}

/// Title extractor: emits `(title id → Year)`.
pub fn map_titles(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let iter = split_lines(&kv.value)
        .into_iter()
        .filter_map(|line| parse_title(&line))
        .map(|(id, year)| Ok(KeyValue::new(id, GroupedValue::Year(year).encode())));
    Ok(Box::new(iter))
}

/// Actor extractor: emits `(title id → ActorMarker)` for the target actor.
pub fn map_credits(kv: KeyValue, aux: Bytes) -> MapOutput {
    let args = JoinArgs::from_aux(&aux).context("decoding join arguments")?;
    let iter = split_lines(&kv.value)
        .into_iter()
        .filter_map(move |line| parse_credit(&line, &args.actor))
        .map(|(id, name)| Ok(KeyValue::new(id, GroupedValue::ActorMarker(name).encode())));
    Ok(Box::new(iter))
}

/// Decides whether one title's group is a match, returning its year.
pub fn reconcile<I>(values: I, mode: Reconciliation) -> Option<String>
where
    I: IntoIterator<Item = GroupedValue>,
{
    let mut year: Option<String> = None;
    let mut has_actor = false;
    match mode {
        Reconciliation::Tagged => {
            for value in values {
                match value {
                    GroupedValue::Year(y) => {
                        if year.is_none() {
                            year = Some(y);
                        }
                    }
                    GroupedValue::ActorMarker(_) => has_actor = true,
                }
            }
        }
        // Position decides, the tag is ignored: a title missing from the
        // title source has an actor name taken for its year.
        Reconciliation::Positional => {
            for value in values {
                if year.is_none() {
                    year = Some(value.payload().to_string());
                } else {
                    has_actor = true;
                }
            }
        }
    }
    year.filter(|_| has_actor)
}

/// Join reconciler: emits `actor|year\t1` once per matching title.
pub fn reduce_join(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    aux: Bytes,
) -> Result<Bytes> {
    let args = JoinArgs::from_aux(&aux).context("decoding join arguments")?;
    let values = values
        .map(GroupedValue::decode)
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("decoding values of title {}", String::from_utf8_lossy(&key)))?;

    let mut writer = BytesMut::new();
    if let Some(year) = reconcile(values, args.reconciliation) {
        writer.put(format!("{}|{}\t1\n", args.actor, year).as_bytes());
    }
    Ok(writer.freeze())
}

/// Count extractor: emits `(actor|year → 1)` per fact line, whatever its
/// recorded count.
pub fn map_facts(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let iter = split_lines(&kv.value).into_iter().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let mut fields = line.split('\t');
        let key = fields.next()?;
        fields.next()?;
        Some(Ok(KeyValue::new(key.to_string(), encode_count(1))))
    });
    Ok(Box::new(iter))
}

/// Sums count contributions.
pub fn sum_counts<I>(values: I) -> Result<u64>
where
    I: IntoIterator<Item = Bytes>,
{
    values
        .into_iter()
        .try_fold(0u64, |acc, value| -> Result<u64> { Ok(acc + decode_count(value)?) })
}

/// Sum aggregator: emits `actor|year\ttotal`.
pub fn reduce_sum(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let total = sum_counts(values)?;

    let mut writer = BytesMut::new();
    let key = string_from_bytes(key)?;
    writer.put(format!("{}\t{}\n", key, total).as_bytes());
    Ok(writer.freeze())
}
