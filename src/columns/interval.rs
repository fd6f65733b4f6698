//! `Interval*` column codecs.
//!
//! An interval column carries a signed 64-bit tick count; the unit is fixed
//! by the type name (`IntervalSecond`, `IntervalWeek`, ...). Second through
//! week units are calendar-independent constants; year, quarter and month
//! lengths come from [`crate::config::CodecConfig`], as the server's calendar
//! metadata is authoritative for those.

use bytes::{BufMut, BytesMut};
use chrono::Duration;

use crate::columns::fixed::{le_array, FixedSpec};
use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::value::Value;

/// Seconds per tick for a unit suffix, or `None` for unknown suffixes.
pub(crate) fn tick_seconds(unit: &str, config: &CodecConfig) -> Option<i64> {
    match unit {
        "Second" => Some(1),
        "Minute" => Some(60),
        "Hour" => Some(3600),
        "Day" => Some(86_400),
        "Week" => Some(7 * 86_400),
        "Month" => Some(config.month_duration_secs as i64),
        "Quarter" => Some(config.quarter_duration_secs as i64),
        "Year" => Some(config.year_duration_secs as i64),
        _ => None,
    }
}

#[derive(Clone)]
pub(crate) struct IntervalSpec {
    pub(crate) tick_secs: i64,
}

impl FixedSpec for IntervalSpec {
    type Elem = i64;

    const WIDTH: usize = 8;

    fn decode_elem(&self, chunk: &[u8]) -> i64 {
        i64::from_le_bytes(le_array(chunk))
    }

    fn encode_elem(&self, elem: i64, sink: &mut BytesMut) {
        sink.put_i64_le(elem);
    }

    fn to_value(&self, elem: i64) -> Result<Value, CodecError> {
        let total = elem.checked_mul(self.tick_secs).ok_or_else(|| {
            CodecError::MalformedPayload(format!(
                "interval of {} ticks at {}s per tick overflows",
                elem, self.tick_secs
            ))
        })?;
        Ok(Value::Interval(Duration::seconds(total)))
    }

    fn from_value(&self, val: &Value) -> Result<i64, String> {
        match val {
            Value::Interval(d) => {
                let secs = d.num_seconds();
                if secs % self.tick_secs != 0 {
                    return Err(format!(
                        "interval of {}s is not a whole number of {}s ticks",
                        secs, self.tick_secs
                    ));
                }
                Ok(secs / self.tick_secs)
            }
            // Integers are accepted as raw tick counts.
            other => other
                .as_i64()
                .ok_or_else(|| format!("expected an interval, got {:?}", other)),
        }
    }

    fn null_elem(&self) -> i64 {
        0
    }
}
