//! Byte-level JDWP encoding and decoding.
//!
//! All multi-byte quantities are big-endian. Identifiers are written as fixed
//! 8-byte fields: this backend defines the id sizes it advertises, so the
//! variable-width indirection a client needs is absent here.

use thiserror::Error;

use crate::types::{
    ErrorCode, LineTable, LineTableEntry, Location, ObjectId, TypeTag, Value, VariableSlot,
    VariableTable,
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("buffer underflow: need {needed} bytes at offset {offset}, have {available}")]
    Underflow {
        needed: usize,
        offset: usize,
        available: usize,
    },
    #[error("invalid utf-8 in wire string: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),
    #[error("invalid value tag byte {0}")]
    InvalidTag(u8),
    #[error("invalid reference type tag byte {0}")]
    InvalidTypeTag(u8),
}

pub type Result<T> = std::result::Result<T, CodecError>;

pub struct JdwpWriter {
    buf: Vec<u8>,
}

impl Default for JdwpWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl JdwpWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(if v { 1 } else { 0 });
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// JDWP strings are a u32 byte count followed by UTF-8 bytes.
    pub fn write_string(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_id(&mut self, id: u64) {
        self.write_u64(id);
    }

    pub fn write_tagged_id(&mut self, tag: u8, id: ObjectId) {
        self.write_u8(tag);
        self.write_id(id);
    }

    pub fn write_error_code(&mut self, code: ErrorCode) {
        self.write_u16(code.as_u16());
    }

    pub fn write_location(&mut self, loc: &Location) {
        self.write_u8(loc.type_tag.as_u8());
        self.write_id(loc.class_id);
        self.write_id(loc.method_id);
        self.write_u64(loc.index);
    }

    /// The untagged value form, used where the tag is implied by context.
    pub fn write_value(&mut self, v: &Value) {
        match *v {
            Value::Void => {}
            Value::Boolean(v) => self.write_bool(v),
            Value::Byte(v) => self.write_u8(v as u8),
            Value::Char(v) => self.write_u16(v),
            Value::Short(v) => self.write_u16(v as u16),
            Value::Int(v) => self.write_i32(v),
            Value::Long(v) => self.write_i64(v),
            Value::Float(v) => self.write_f32(v),
            Value::Double(v) => self.write_f64(v),
            Value::Object { id, .. } => self.write_id(id),
        }
    }

    pub fn write_tagged_value(&mut self, v: &Value) {
        self.write_u8(v.tag());
        self.write_value(v);
    }

    pub fn write_line_table(&mut self, table: &LineTable) {
        self.write_i64(table.start);
        self.write_i64(table.end);
        self.write_u32(table.lines.len() as u32);
        for entry in &table.lines {
            self.write_u64(entry.code_index);
            self.write_u32(entry.line);
        }
    }

    /// `with_generic` selects the `VariableTableWithGeneric` layout, which
    /// inserts the (possibly empty) generic signature between the type
    /// signature and the slot length.
    pub fn write_variable_table(&mut self, table: &VariableTable, with_generic: bool) {
        self.write_u32(table.arg_count);
        self.write_u32(table.slots.len() as u32);
        for slot in &table.slots {
            self.write_u64(slot.code_index);
            self.write_string(&slot.name);
            self.write_string(&slot.signature);
            if with_generic {
                self.write_string(&slot.generic_signature);
            }
            self.write_u32(slot.length);
            self.write_u32(slot.slot);
        }
    }
}

pub struct JdwpReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> JdwpReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn require(&self, n: usize) -> Result<()> {
        let end = self.pos.checked_add(n);
        if end.is_none() || end.unwrap_or(usize::MAX) > self.buf.len() {
            return Err(CodecError::Underflow {
                needed: n,
                offset: self.pos,
                available: self.buf.len().saturating_sub(self.pos),
            });
        }
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.require(2)?;
        let v = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.require(4)?;
        let mut be = [0u8; 4];
        be.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_be_bytes(be))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.require(8)?;
        let mut be = [0u8; 8];
        be.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(u64::from_be_bytes(be))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        self.require(len)?;
        let bytes = self.buf[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn read_id(&mut self) -> Result<u64> {
        self.read_u64()
    }

    pub fn read_tagged_id(&mut self) -> Result<(u8, ObjectId)> {
        let tag = self.read_u8()?;
        let id = self.read_id()?;
        Ok((tag, id))
    }

    pub fn read_error_code(&mut self) -> Result<u16> {
        self.read_u16()
    }

    pub fn read_location(&mut self) -> Result<Location> {
        let raw_tag = self.read_u8()?;
        let type_tag = TypeTag::from_u8(raw_tag).ok_or(CodecError::InvalidTypeTag(raw_tag))?;
        Ok(Location {
            type_tag,
            class_id: self.read_id()?,
            method_id: self.read_id()?,
            index: self.read_u64()?,
        })
    }

    pub fn read_value(&mut self, tag: u8) -> Result<Value> {
        use crate::types::tag as t;
        let v = match tag {
            t::VOID => Value::Void,
            t::BOOLEAN => Value::Boolean(self.read_bool()?),
            t::BYTE => Value::Byte(self.read_u8()? as i8),
            t::CHAR => Value::Char(self.read_u16()?),
            t::SHORT => Value::Short(self.read_u16()? as i16),
            t::INT => Value::Int(self.read_i32()?),
            t::LONG => Value::Long(self.read_i64()?),
            t::FLOAT => Value::Float(self.read_f32()?),
            t::DOUBLE => Value::Double(self.read_f64()?),
            t::OBJECT
            | t::STRING
            | t::THREAD
            | t::THREAD_GROUP
            | t::CLASS_LOADER
            | t::CLASS_OBJECT
            | t::ARRAY => Value::Object {
                tag,
                id: self.read_id()?,
            },
            other => return Err(CodecError::InvalidTag(other)),
        };
        Ok(v)
    }

    pub fn read_tagged_value(&mut self) -> Result<Value> {
        let tag = self.read_u8()?;
        self.read_value(tag)
    }

    pub fn read_line_table(&mut self) -> Result<LineTable> {
        let start = self.read_i64()?;
        let end = self.read_i64()?;
        let count = self.read_u32()? as usize;
        let mut lines = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            lines.push(LineTableEntry {
                code_index: self.read_u64()?,
                line: self.read_u32()?,
            });
        }
        Ok(LineTable { start, end, lines })
    }

    pub fn read_variable_table(&mut self, with_generic: bool) -> Result<VariableTable> {
        let arg_count = self.read_u32()?;
        let count = self.read_u32()? as usize;
        let mut slots = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let code_index = self.read_u64()?;
            let name = self.read_string()?;
            let signature = self.read_string()?;
            let generic_signature = if with_generic {
                self.read_string()?
            } else {
                String::new()
            };
            slots.push(VariableSlot {
                code_index,
                name,
                signature,
                generic_signature,
                length: self.read_u32()?,
                slot: self.read_u32()?,
            });
        }
        Ok(VariableTable { arg_count, slots })
    }
}
