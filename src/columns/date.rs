//! `Date`, `DateTime` and `DateTime64(p)` column codecs.
//!
//! All three are fixed-width integer payloads under the hood: a 16-bit day
//! number, a 32-bit epoch second, and a 64-bit tick count at 10^-p seconds.
//! Values are surfaced in UTC; a time-zone name in the type string stays
//! visible on the descriptor's normalized type for callers that render it.

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::columns::fixed::{le_array, FixedSpec};
use crate::error::CodecError;
use crate::value::Value;

fn epoch_date() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

//==================================================================================
// I. Date (16-bit day number)
//==================================================================================

#[derive(Clone)]
pub(crate) struct DateSpec;

impl FixedSpec for DateSpec {
    type Elem = u16;

    const WIDTH: usize = 2;

    fn decode_elem(&self, chunk: &[u8]) -> u16 {
        u16::from_le_bytes(le_array(chunk))
    }

    fn encode_elem(&self, elem: u16, sink: &mut BytesMut) {
        sink.put_u16_le(elem);
    }

    fn to_value(&self, elem: u16) -> Result<Value, CodecError> {
        epoch_date()
            .checked_add_days(Days::new(elem as u64))
            .map(Value::Date)
            .ok_or_else(|| CodecError::InternalError(format!("day number {} out of calendar range", elem)))
    }

    fn from_value(&self, val: &Value) -> Result<u16, String> {
        let days = match val {
            Value::Date(d) => d.signed_duration_since(epoch_date()).num_days(),
            other => other
                .as_i64()
                .ok_or_else(|| format!("expected a date, got {:?}", other))?,
        };
        u16::try_from(days).map_err(|_| format!("day number {} is out of range [0, 65535]", days))
    }

    fn null_elem(&self) -> u16 {
        0
    }
}

//==================================================================================
// II. DateTime (32-bit epoch seconds)
//==================================================================================

#[derive(Clone)]
pub(crate) struct DateTimeSpec;

impl FixedSpec for DateTimeSpec {
    type Elem = u32;

    const WIDTH: usize = 4;

    fn decode_elem(&self, chunk: &[u8]) -> u32 {
        u32::from_le_bytes(le_array(chunk))
    }

    fn encode_elem(&self, elem: u32, sink: &mut BytesMut) {
        sink.put_u32_le(elem);
    }

    fn to_value(&self, elem: u32) -> Result<Value, CodecError> {
        DateTime::from_timestamp(elem as i64, 0)
            .map(Value::DateTime)
            .ok_or_else(|| CodecError::InternalError(format!("epoch second {} out of range", elem)))
    }

    fn from_value(&self, val: &Value) -> Result<u32, String> {
        let secs = match val {
            // Sub-second digits are dropped; the wire has whole seconds only.
            Value::DateTime(dt) => dt.timestamp(),
            other => other
                .as_i64()
                .ok_or_else(|| format!("expected a date-time, got {:?}", other))?,
        };
        u32::try_from(secs).map_err(|_| format!("epoch second {} is out of range [0, {}]", secs, u32::MAX))
    }

    fn null_elem(&self) -> u32 {
        0
    }
}

//==================================================================================
// III. DateTime64 (64-bit ticks at 10^-precision seconds)
//==================================================================================

#[derive(Clone)]
pub(crate) struct DateTime64Spec {
    pub(crate) precision: u32,
    /// Precisions finer than nanoseconds cannot be represented exactly; when
    /// set, the extra digits are truncated instead of failing the decode.
    pub(crate) saturate_extra_nanos: bool,
}

const NANOS_PER_SEC: i128 = 1_000_000_000;

impl DateTime64Spec {
    fn ticks_to_nanos(&self, ticks: i64) -> Result<i128, CodecError> {
        if self.precision <= 9 {
            let mult = 10i128.pow(9 - self.precision);
            Ok(ticks as i128 * mult)
        } else {
            let div = 10i128.pow(self.precision - 9);
            if !self.saturate_extra_nanos && ticks as i128 % div != 0 {
                return Err(CodecError::MalformedPayload(format!(
                    "DateTime64 tick {} at precision {} has sub-nanosecond digits",
                    ticks, self.precision
                )));
            }
            Ok(ticks as i128 / div)
        }
    }

    fn nanos_to_ticks(&self, nanos: i128) -> Result<i64, String> {
        let ticks = if self.precision <= 9 {
            let mult = 10i128.pow(9 - self.precision);
            nanos / mult
        } else {
            nanos * 10i128.pow(self.precision - 9)
        };
        i64::try_from(ticks).map_err(|_| {
            format!(
                "timestamp does not fit a 64-bit tick count at precision {}",
                self.precision
            )
        })
    }
}

impl FixedSpec for DateTime64Spec {
    type Elem = i64;

    const WIDTH: usize = 8;

    fn decode_elem(&self, chunk: &[u8]) -> i64 {
        i64::from_le_bytes(le_array(chunk))
    }

    fn encode_elem(&self, elem: i64, sink: &mut BytesMut) {
        sink.put_i64_le(elem);
    }

    fn to_value(&self, elem: i64) -> Result<Value, CodecError> {
        let nanos = self.ticks_to_nanos(elem)?;
        let secs = nanos.div_euclid(NANOS_PER_SEC);
        let subsec = nanos.rem_euclid(NANOS_PER_SEC);
        DateTime::from_timestamp(secs as i64, subsec as u32)
            .map(Value::DateTime)
            .ok_or_else(|| CodecError::MalformedPayload(format!("DateTime64 tick {} out of range", elem)))
    }

    fn from_value(&self, val: &Value) -> Result<i64, String> {
        match val {
            Value::DateTime(dt) => {
                let nanos = dt.timestamp() as i128 * NANOS_PER_SEC + dt.timestamp_subsec_nanos() as i128;
                self.nanos_to_ticks(nanos)
            }
            // Integers are accepted as raw tick counts.
            other => other
                .as_i64()
                .ok_or_else(|| format!("expected a date-time, got {:?}", other)),
        }
    }

    fn null_elem(&self) -> i64 {
        0
    }
}
