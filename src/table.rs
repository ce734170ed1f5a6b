//! CSV input and output tables.

use csv::{ReaderBuilder, WriterBuilder};
use std::io::{Read, Write};
use tracing::{debug, info};

use crate::config::{ColumnsConfig, OutputConfig};
use crate::error::PipelineError;
use crate::models::{Corpus, DisplayLanguage, Record, ScoredRecord};
use crate::stages::Disagreement;

/// Input header layout, resolved once before any record is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    headers: Vec<String>,
    text_index: usize,
}

impl Schema {
    /// Picks the text column: the configured name when present, otherwise the
    /// first alias found. Names compare case-insensitively.
    pub fn resolve(headers: Vec<String>, columns: &ColumnsConfig) -> Result<Self, PipelineError> {
        let headers: Vec<String> = headers
            .into_iter()
            .enumerate()
            .map(|(i, h)| if i == 0 { h.trim_start_matches('\u{feff}').to_string() } else { h })
            .collect();

        let candidates: Vec<&str> = columns
            .text_column
            .as_deref()
            .into_iter()
            .chain(columns.text_aliases.iter().map(String::as_str))
            .collect();

        let text_index = candidates
            .iter()
            .find_map(|wanted| {
                headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(wanted.trim()))
            })
            .ok_or_else(|| PipelineError::MissingTextColumn {
                expected: candidates.iter().map(|c| c.to_string()).collect(),
                found: headers.clone(),
            })?;

        debug!("Text column resolved - name={}, index={}", headers[text_index], text_index);
        Ok(Self { headers, text_index })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn text_column(&self) -> &str {
        &self.headers[self.text_index]
    }

    pub fn text_index(&self) -> usize {
        self.text_index
    }
}

pub fn read_corpus<R: Read>(
    reader: R,
    columns: &ColumnsConfig,
) -> Result<(Schema, Corpus), PipelineError> {
    let mut rdr = ReaderBuilder::new().has_headers(true).flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let schema = Schema::resolve(headers, columns)?;

    let mut records = Vec::new();
    for (ordinal, row) in rdr.records().enumerate() {
        let row = row?;
        let mut cells: Vec<String> = row.iter().map(str::to_string).collect();
        cells.resize(schema.headers.len(), String::new());
        let raw = cells[schema.text_index].clone();
        records.push(Record::new(ordinal, cells, raw));
    }

    info!("Loaded {} rows (text column '{}')", records.len(), schema.text_column());
    Ok((schema, Corpus::new(records)))
}

/// Names of the derived output columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumns {
    pub clean_text: String,
    pub lexical_sentiment: String,
    pub lexical_score: String,
    pub contextual_sentiment: String,
    pub contextual_score: String,
    pub agreement: String,
    pub theme: String,
}

impl OutputColumns {
    pub fn from_config(config: &OutputConfig) -> Self {
        Self {
            clean_text: config.clean_text_column.clone(),
            lexical_sentiment: format!("sentiment_{}", config.lexical_suffix),
            lexical_score: format!("score_{}", config.lexical_suffix),
            contextual_sentiment: format!("sentiment_{}", config.contextual_suffix),
            contextual_score: format!("score_{}", config.contextual_suffix),
            agreement: config.agreement_column.clone(),
            theme: config.theme_column.clone(),
        }
    }

    fn names(&self) -> [&str; 7] {
        [
            self.clean_text.as_str(),
            self.lexical_sentiment.as_str(),
            self.lexical_score.as_str(),
            self.contextual_sentiment.as_str(),
            self.contextual_score.as_str(),
            self.agreement.as_str(),
            self.theme.as_str(),
        ]
    }

    /// Output headers plus the position of each derived column. A derived
    /// column already present in the input is reused in place.
    fn layout(&self, schema: &Schema) -> (Vec<String>, [usize; 7]) {
        let mut headers = schema.headers.clone();
        let mut positions = [0usize; 7];
        for (slot, name) in self.names().into_iter().enumerate() {
            let existing = headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
            positions[slot] = match existing {
                Some(idx) => idx,
                None => {
                    headers.push(name.to_string());
                    headers.len() - 1
                }
            };
        }
        (headers, positions)
    }
}

fn format_score(score: f64) -> String {
    format!("{score:.4}")
}

/// Writes every scored record: original cells first, derived columns after.
pub fn write_scored<W: Write>(
    writer: W,
    schema: &Schema,
    columns: &OutputColumns,
    records: &[ScoredRecord],
    language: DisplayLanguage,
) -> Result<(), PipelineError> {
    let (headers, positions) = columns.layout(schema);
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    wtr.write_record(&headers)?;

    for scored in records {
        let r = &scored.reconciled;
        let mut row = r.record.cells.clone();
        row.resize(headers.len(), String::new());
        let derived = [
            r.record.clean_text.clone(),
            r.lexical.sentiment.label(language).to_string(),
            format_score(r.lexical.polarity.value()),
            r.contextual.sentiment.label(language).to_string(),
            format_score(r.contextual.confidence.value()),
            r.agreement.to_string(),
            scored.theme.clone(),
        ];
        for (pos, value) in positions.iter().zip(derived) {
            row[*pos] = value;
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_disagreements<W: Write>(
    writer: W,
    columns: &OutputColumns,
    rows: &[Disagreement<'_>],
    language: DisplayLanguage,
) -> Result<(), PipelineError> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    wtr.write_record([
        "row",
        "text",
        columns.lexical_sentiment.as_str(),
        columns.contextual_sentiment.as_str(),
    ])?;
    for d in rows {
        wtr.write_record([
            d.ordinal.to_string().as_str(),
            d.text,
            d.lexical.label(language),
            d.contextual.label(language),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
