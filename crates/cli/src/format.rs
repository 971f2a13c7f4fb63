//! Output formatting for human and JSON modes.

use chrono::{TimeZone, Utc};
use dirstore_core::{FieldValue, StoredObject};
use dirstore_durability::{DumpImage, JournalRecord, JournalScan};
use dirstore_engine::RecoverySummary;
use serde_json::{json, Map, Value as Json};

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Aligned text for terminals
    Human,
    /// One JSON document
    Json,
}

/// Objects in a base after recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseCount {
    pub id: i16,
    pub name: String,
    pub objects: usize,
    pub max_id: i32,
}

fn timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

fn field_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Scalar(v) => v.to_string(),
        FieldValue::Vector(values) => {
            let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

fn object_json(object: &StoredObject) -> Json {
    let mut fields = Map::new();
    for (id, value) in object.fields() {
        let rendered = match value {
            FieldValue::Scalar(v) => Json::String(v.to_string()),
            FieldValue::Vector(values) => {
                Json::Array(values.iter().map(|v| Json::String(v.to_string())).collect())
            }
        };
        fields.insert(id.0.to_string(), rendered);
    }
    json!({ "invid": object.invid().to_string(), "fields": fields })
}

/// Format a scanned journal.
pub fn format_journal(scan: &JournalScan, with_objects: bool, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => {
            let frames: Vec<Json> = scan
                .frames
                .iter()
                .map(|frame| {
                    let records: Vec<Json> = frame
                        .records
                        .iter()
                        .map(|record| {
                            let mut entry = json!({
                                "op": record.op().to_string(),
                                "invid": record.invid().to_string(),
                            });
                            if let (true, JournalRecord::Create(o) | JournalRecord::Edit(o)) =
                                (with_objects, record)
                            {
                                entry["object"] = object_json(o);
                            }
                            entry
                        })
                        .collect();
                    json!({
                        "offset": frame.offset,
                        "timestamp": timestamp(frame.timestamp_millis),
                        "records": records,
                    })
                })
                .collect();
            json!({
                "version": format!("{}.{}", scan.header.major, scan.header.minor),
                "created": timestamp(scan.header.created_millis),
                "frames": frames,
                "valid_bytes": scan.valid_len,
                "discarded_bytes": scan.discarded_bytes(),
            })
            .to_string()
        }
        OutputMode::Human => {
            let mut out = format!(
                "journal v{}.{} created {}\n",
                scan.header.major,
                scan.header.minor,
                timestamp(scan.header.created_millis)
            );
            for (n, frame) in scan.frames.iter().enumerate() {
                out.push_str(&format!(
                    "#{:<4} @{:<8} {}  {} record(s)\n",
                    n + 1,
                    frame.offset,
                    timestamp(frame.timestamp_millis),
                    frame.records.len()
                ));
                for record in &frame.records {
                    out.push_str(&format!("      {:<6} {}\n", record.op(), record.invid()));
                    if let (true, JournalRecord::Create(o) | JournalRecord::Edit(o)) =
                        (with_objects, record)
                    {
                        for (id, value) in o.fields() {
                            out.push_str(&format!("        {:>5} = {}\n", id, field_text(value)));
                        }
                    }
                }
            }
            out.push_str(&format!(
                "{} frame(s), {} record(s)",
                scan.frames.len(),
                scan.record_count()
            ));
            if scan.discarded_tail() {
                out.push_str(&format!(
                    "; {} trailing byte(s) will be discarded",
                    scan.discarded_bytes()
                ));
            }
            out
        }
    }
}

/// Format a decoded dump.
pub fn format_dump(image: &DumpImage, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => {
            let bases: Vec<Json> = image
                .bases
                .iter()
                .map(|b| json!({ "base": b.base.0, "max_id": b.max_id.0, "objects": b.objects.len() }))
                .collect();
            json!({
                "timestamp": timestamp(image.timestamp_millis),
                "objects": image.object_count(),
                "bases": bases,
            })
            .to_string()
        }
        OutputMode::Human => {
            let mut out = format!("dump taken {}\n", timestamp(image.timestamp_millis));
            for b in &image.bases {
                out.push_str(&format!(
                    "  base {:<5} {:>8} object(s)  max id {}\n",
                    b.base.0,
                    b.objects.len(),
                    b.max_id.0
                ));
            }
            out.push_str(&format!("{} object(s) total", image.object_count()));
            out
        }
    }
}

/// Format the outcome of opening a store.
pub fn format_recovery(summary: &RecoverySummary, bases: &[BaseCount], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => {
            let rows: Vec<Json> = bases
                .iter()
                .map(|b| json!({ "id": b.id, "name": b.name, "objects": b.objects, "max_id": b.max_id }))
                .collect();
            json!({
                "objects_loaded": summary.objects_loaded,
                "frames_applied": summary.frames_applied,
                "records_applied": summary.records_applied,
                "discarded_tail": summary.discarded_tail,
                "bases": rows,
            })
            .to_string()
        }
        OutputMode::Human => {
            let mut out = format!(
                "dump: {} object(s); journal: {} frame(s), {} record(s){}\n",
                summary.objects_loaded,
                summary.frames_applied,
                summary.records_applied,
                if summary.discarded_tail {
                    "; torn tail discarded"
                } else {
                    ""
                }
            );
            for b in bases {
                out.push_str(&format!(
                    "  {:<5} {:<20} {:>8} object(s)  max id {}\n",
                    b.id, b.name, b.objects, b.max_id
                ));
            }
            out.trim_end().to_string()
        }
    }
}

/// Format an error message.
pub fn format_error(message: &str, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => json!({ "error": message }).to_string(),
        OutputMode::Human => format!("(error) {}", message),
    }
}
