//! Object encoding shared by journal records and dump files
//!
//! ```text
//! object := i32 id, i16 field_count, field*
//! field  := i16 field_id, u8 tag, u8 is_vector, payload
//! payload:= value                       (is_vector = 0)
//!         | i16 count, value*           (is_vector = 1)
//! value  := per tag:
//!   1 bool    u8 (0 / 1)
//!   2 int     i32
//!   3 date    i64 milliseconds since the epoch
//!   4 string  modified UTF-8
//!   5 invid   i16 base, i32 id
//!   6 ip      u8 length, octets
//! ```
//!
//! The base id is not part of the object encoding; it is supplied by the
//! enclosing record or dump section.

use crate::codec::{read_utf, write_utf};
use crate::error::{JournalError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use dirstore_core::{BaseId, FieldId, FieldValue, Invid, ObjectId, StoredObject, Value};
use std::collections::BTreeMap;
use std::io::{Read, Write};

const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_DATE: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_INVID: u8 = 5;
const TAG_IP: u8 = 6;

fn tag_of(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => TAG_BOOL,
        Value::Int(_) => TAG_INT,
        Value::Date(_) => TAG_DATE,
        Value::String(_) => TAG_STRING,
        Value::Invid(_) => TAG_INVID,
        Value::Ip(_) => TAG_IP,
    }
}

/// Write an object's id and fields
pub fn write_object<W: Write>(w: &mut W, object: &StoredObject) -> Result<()> {
    w.write_i32::<BigEndian>(object.invid().id().0)?;
    let count = i16::try_from(object.field_count())
        .map_err(|_| JournalError::Corrupt("too many fields to encode".to_string()))?;
    w.write_i16::<BigEndian>(count)?;

    for (field, value) in object.fields() {
        w.write_i16::<BigEndian>(field.0)?;
        match value {
            FieldValue::Scalar(v) => {
                w.write_u8(tag_of(v))?;
                w.write_u8(0)?;
                write_value(w, v)?;
            }
            FieldValue::Vector(values) => {
                // An empty vector is never stored, so the first element
                // always exists and fixes the tag.
                let tag = values.first().map_or(TAG_STRING, tag_of);
                w.write_u8(tag)?;
                w.write_u8(1)?;
                let len = i16::try_from(values.len())
                    .map_err(|_| JournalError::Corrupt("vector too long to encode".to_string()))?;
                w.write_i16::<BigEndian>(len)?;
                for v in values {
                    if tag_of(v) != tag {
                        return Err(JournalError::Corrupt(format!(
                            "mixed element types in field {}",
                            field
                        )));
                    }
                    write_value(w, v)?;
                }
            }
        }
    }
    Ok(())
}

fn write_value<W: Write>(w: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Bool(b) => w.write_u8(u8::from(*b))?,
        Value::Int(i) => w.write_i32::<BigEndian>(*i)?,
        Value::Date(d) => w.write_i64::<BigEndian>(d.timestamp_millis())?,
        Value::String(s) => write_utf(w, s)?,
        Value::Invid(invid) => {
            w.write_i16::<BigEndian>(invid.base().0)?;
            w.write_i32::<BigEndian>(invid.id().0)?;
        }
        Value::Ip(octets) => {
            let len = u8::try_from(octets.len())
                .map_err(|_| JournalError::Corrupt("IP address too long".to_string()))?;
            w.write_u8(len)?;
            w.write_all(octets)?;
        }
    }
    Ok(())
}

/// Read an object belonging to `base`
pub fn read_object<R: Read>(r: &mut R, base: BaseId) -> Result<StoredObject> {
    let id = ObjectId(r.read_i32::<BigEndian>()?);
    let count = r.read_i16::<BigEndian>()?;
    if count < 0 {
        return Err(JournalError::Corrupt(format!(
            "negative field count {}",
            count
        )));
    }

    let mut fields = BTreeMap::new();
    for _ in 0..count {
        let field = FieldId(r.read_i16::<BigEndian>()?);
        let tag = r.read_u8()?;
        let value = match r.read_u8()? {
            0 => FieldValue::Scalar(read_value(r, tag)?),
            1 => {
                let len = r.read_i16::<BigEndian>()?;
                if len < 0 {
                    return Err(JournalError::Corrupt(format!(
                        "negative vector length {}",
                        len
                    )));
                }
                let values = (0..len)
                    .map(|_| read_value(r, tag))
                    .collect::<Result<Vec<_>>>()?;
                FieldValue::Vector(values)
            }
            other => {
                return Err(JournalError::Corrupt(format!(
                    "invalid vector flag {}",
                    other
                )))
            }
        };
        fields.insert(field, value);
    }
    Ok(StoredObject::from_fields(Invid::new(base, id), fields))
}

fn read_value<R: Read>(r: &mut R, tag: u8) -> Result<Value> {
    let value = match tag {
        TAG_BOOL => Value::Bool(r.read_u8()? != 0),
        TAG_INT => Value::Int(r.read_i32::<BigEndian>()?),
        TAG_DATE => {
            let millis = r.read_i64::<BigEndian>()?;
            Value::date_from_millis(millis)
                .ok_or_else(|| JournalError::Corrupt(format!("date out of range: {}", millis)))?
        }
        TAG_STRING => Value::String(read_utf(r)?),
        TAG_INVID => {
            let base = BaseId(r.read_i16::<BigEndian>()?);
            let id = ObjectId(r.read_i32::<BigEndian>()?);
            Value::Invid(Invid::new(base, id))
        }
        TAG_IP => {
            let len = r.read_u8()? as usize;
            let mut octets = vec![0u8; len];
            r.read_exact(&mut octets)?;
            Value::Ip(octets)
        }
        other => return Err(JournalError::Corrupt(format!("unknown value tag {}", other))),
    };
    Ok(value)
}
