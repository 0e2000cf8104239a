use std::borrow::Cow;
use std::fmt::{self, Write as _};

use crate::clock;
use crate::level::{self, Level};
use crate::outbuf::LineWriter;
use crate::record::{RecordHeader, HEADER_SIZE};
use crate::registry;

/// Encoded footprint of a program-lifetime string: u16 length + 8-byte
/// address. The content bytes are never copied.
const STATIC_STR_SIZE: usize = 2 + 8;

/// A decoded argument, borrowed from the payload (or, for program-lifetime
/// strings, from the original storage).
pub enum Value<'a> {
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Char(char),
    Str(&'a str),
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// A loggable argument. The encoding is type-directed and tag-free: the
/// decode side is an associated function of the same type, so encoder and
/// decoder agree on the layout by construction.
pub trait Encode {
    fn encoded_size(&self) -> usize;
    /// Write the argument into `buf`, returning the bytes used.
    fn encode(&self, buf: &mut [u8]) -> usize;
    /// Read one argument back, returning its value view and the bytes used.
    fn decode(buf: &[u8]) -> (Value<'_>, usize);
}

impl<T: Encode> Encode for &T {
    fn encoded_size(&self) -> usize {
        T::encoded_size(*self)
    }

    fn encode(&self, buf: &mut [u8]) -> usize {
        T::encode(*self, buf)
    }

    fn decode(buf: &[u8]) -> (Value<'_>, usize) {
        T::decode(buf)
    }
}

macro_rules! impl_encode_scalar {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {$(
        impl Encode for $ty {
            fn encoded_size(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn encode(&self, buf: &mut [u8]) -> usize {
                let bytes = self.to_ne_bytes();
                buf[..bytes.len()].copy_from_slice(&bytes);
                bytes.len()
            }

            fn decode(buf: &[u8]) -> (Value<'_>, usize) {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                let value = <$ty>::from_ne_bytes(buf[..WIDTH].try_into().expect("slice length"));
                (Value::$variant(value as $cast), WIDTH)
            }
        }
    )*};
}

impl_encode_scalar!(
    i8 => I64 as i64,
    i16 => I64 as i64,
    i32 => I64 as i64,
    i64 => I64 as i64,
    isize => I64 as i64,
    u8 => U64 as u64,
    u16 => U64 as u64,
    u32 => U64 as u64,
    u64 => U64 as u64,
    usize => U64 as u64,
    f32 => F32 as f32,
    f64 => F64 as f64,
);

impl Encode for bool {
    fn encoded_size(&self) -> usize {
        1
    }

    fn encode(&self, buf: &mut [u8]) -> usize {
        buf[0] = *self as u8;
        1
    }

    fn decode(buf: &[u8]) -> (Value<'_>, usize) {
        (Value::Bool(buf[0] != 0), 1)
    }
}

impl Encode for char {
    fn encoded_size(&self) -> usize {
        4
    }

    fn encode(&self, buf: &mut [u8]) -> usize {
        buf[..4].copy_from_slice(&(*self as u32).to_ne_bytes());
        4
    }

    fn decode(buf: &[u8]) -> (Value<'_>, usize) {
        let raw = u32::from_ne_bytes(buf[..4].try_into().expect("slice length"));
        (Value::Char(char::from_u32(raw).unwrap_or('\u{FFFD}')), 4)
    }
}

/// Program-lifetime strings are encoded as length + address; the bytes stay
/// where the compiler put them.
impl Encode for &'static str {
    fn encoded_size(&self) -> usize {
        STATIC_STR_SIZE
    }

    fn encode(&self, buf: &mut [u8]) -> usize {
        encode_str_ref(self, buf)
    }

    fn decode(buf: &[u8]) -> (Value<'_>, usize) {
        let (s, used) = decode_str_ref(buf);
        (Value::Str(s), used)
    }
}

macro_rules! impl_encode_owned_str {
    ($($ty:ty),* $(,)?) => {$(
        impl Encode for $ty {
            fn encoded_size(&self) -> usize {
                2 + clamp_str(self).len()
            }

            fn encode(&self, buf: &mut [u8]) -> usize {
                encode_str_copied(self, buf)
            }

            fn decode(buf: &[u8]) -> (Value<'_>, usize) {
                decode_str_copied(buf)
            }
        }
    )*};
}

impl_encode_owned_str!(String, Box<str>, Cow<'_, str>);

/// Lengths travel as u16; longer strings are cut at the last char boundary
/// that fits.
fn clamp_str(s: &str) -> &str {
    if s.len() <= u16::MAX as usize {
        return s;
    }
    let mut end = u16::MAX as usize;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn encode_str_ref(s: &str, buf: &mut [u8]) -> usize {
    let s = clamp_str(s);
    buf[..2].copy_from_slice(&(s.len() as u16).to_ne_bytes());
    buf[2..10].copy_from_slice(&(s.as_ptr() as usize).to_ne_bytes());
    STATIC_STR_SIZE
}

fn decode_str_ref(buf: &[u8]) -> (&'static str, usize) {
    let len = u16::from_ne_bytes(buf[..2].try_into().expect("slice length")) as usize;
    let addr = usize::from_ne_bytes(buf[2..10].try_into().expect("slice length"));
    // SAFETY: the encoder stored the address and length of a `&'static str`
    // living in this process; the bytes are immutable for the program's
    // lifetime and were valid UTF-8 when taken.
    let s = unsafe { std::str::from_utf8_unchecked(std::slice::from_raw_parts(addr as *const u8, len)) };
    (s, STATIC_STR_SIZE)
}

fn encode_str_copied(s: &str, buf: &mut [u8]) -> usize {
    let s = clamp_str(s);
    buf[..2].copy_from_slice(&(s.len() as u16).to_ne_bytes());
    buf[2..2 + s.len()].copy_from_slice(s.as_bytes());
    2 + s.len()
}

fn decode_str_copied(buf: &[u8]) -> (Value<'_>, usize) {
    let len = u16::from_ne_bytes(buf[..2].try_into().expect("slice length")) as usize;
    // SAFETY: the encoder copied these bytes from a valid `&str`, clamped on
    // a char boundary.
    let s = unsafe { std::str::from_utf8_unchecked(&buf[2..2 + len]) };
    (Value::Str(s), 2 + len)
}

/// An argument pack: the tuple of a call site's arguments. Each arity is a
/// distinct monomorphization, and `decode_record::<A>` below is the decoder
/// whose address goes into the record header.
pub trait Args {
    fn encoded_size(&self) -> usize;
    fn encode(&self, buf: &mut [u8]);
    fn decode_into(payload: &[u8], fmt: &str, out: &mut LineWriter<'_>);
}

impl Args for () {
    fn encoded_size(&self) -> usize {
        0
    }

    fn encode(&self, _buf: &mut [u8]) {}

    fn decode_into(_payload: &[u8], fmt: &str, out: &mut LineWriter<'_>) {
        let mut cursor = FmtCursor::new(fmt);
        cursor.emit_rest(out);
    }
}

macro_rules! impl_args_tuple {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: Encode),+> Args for ($($name,)+) {
            fn encoded_size(&self) -> usize {
                0 $(+ self.$idx.encoded_size())+
            }

            fn encode(&self, buf: &mut [u8]) {
                let mut pos = 0;
                $(pos += self.$idx.encode(&mut buf[pos..]);)+
                let _ = pos;
            }

            fn decode_into(payload: &[u8], fmt: &str, out: &mut LineWriter<'_>) {
                let mut cursor = FmtCursor::new(fmt);
                let mut rest = payload;
                $(
                    let (value, used) = <$name>::decode(rest);
                    rest = &rest[used..];
                    if cursor.emit_until_hole(out) {
                        let _ = write!(out, "{value}");
                    } else {
                        // More arguments than placeholders: append them.
                        let _ = write!(out, " {value}");
                    }
                )+
                let _ = rest;
                cursor.emit_rest(out);
            }
        }
    };
}

impl_args_tuple!(A.0);
impl_args_tuple!(A.0, B.1);
impl_args_tuple!(A.0, B.1, C.2);
impl_args_tuple!(A.0, B.1, C.2, D.3);
impl_args_tuple!(A.0, B.1, C.2, D.3, E.4);
impl_args_tuple!(A.0, B.1, C.2, D.3, E.4, F.5);
impl_args_tuple!(A.0, B.1, C.2, D.3, E.4, F.5, G.6);
impl_args_tuple!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7);

/// Cursor over a format string with `{}` placeholders and `{{`/`}}` escapes.
struct FmtCursor<'a> {
    rest: &'a str,
}

impl<'a> FmtCursor<'a> {
    fn new(fmt: &'a str) -> Self {
        Self { rest: fmt }
    }

    /// Emit literal text up to and consuming the next placeholder. Returns
    /// false when the format string is exhausted first.
    fn emit_until_hole(&mut self, out: &mut LineWriter<'_>) -> bool {
        loop {
            let Some(brace) = self.rest.find(['{', '}']) else {
                out.push_slice(self.rest.as_bytes());
                self.rest = "";
                return false;
            };

            out.push_slice(self.rest[..brace].as_bytes());
            let tail = &self.rest[brace..];
            if let Some(after) = tail.strip_prefix("{{") {
                out.push_byte(b'{');
                self.rest = after;
            } else if let Some(after) = tail.strip_prefix("}}") {
                out.push_byte(b'}');
                self.rest = after;
            } else if let Some(after) = tail.strip_prefix("{}") {
                self.rest = after;
                return true;
            } else {
                // A lone brace; emit it verbatim.
                out.push_slice(&tail.as_bytes()[..1]);
                self.rest = &tail[1..];
            }
        }
    }

    /// Emit whatever remains, unescaping braces. Placeholders with no
    /// argument left are emitted verbatim.
    fn emit_rest(&mut self, out: &mut LineWriter<'_>) {
        loop {
            let Some(brace) = self.rest.find(['{', '}']) else {
                out.push_slice(self.rest.as_bytes());
                self.rest = "";
                return;
            };

            out.push_slice(self.rest[..brace].as_bytes());
            let tail = &self.rest[brace..];
            if let Some(after) = tail.strip_prefix("{{") {
                out.push_byte(b'{');
                self.rest = after;
            } else if let Some(after) = tail.strip_prefix("}}") {
                out.push_byte(b'}');
                self.rest = after;
            } else {
                out.push_slice(&tail.as_bytes()[..1]);
                self.rest = &tail[1..];
            }
        }
    }
}

/// The per-call-site decoder: recovers the format string (first payload
/// element, never copied) and interpolates the remaining arguments into the
/// staging buffer.
pub(crate) fn decode_record<A: Args>(payload: &[u8], out: &mut LineWriter<'_>) {
    let (fmt, used) = decode_str_ref(payload);
    A::decode_into(&payload[used..], fmt, out);
}

/// Producer entry point: encode one record onto the calling thread's queue.
///
/// Steady state this is wait-free and allocation-free: a level check, a
/// clock read, one reservation on the thread's ring, the payload copy, and
/// a release store. On backpressure at the capacity ceiling the record is
/// dropped and counted; nothing blocks.
pub fn submit<A: Args>(level: Level, fmt: &'static str, args: A) {
    if !level::enabled(level) {
        return;
    }

    let timestamp = clock::global().now();
    let args_size = STATIC_STR_SIZE + args.encoded_size();
    let total = HEADER_SIZE + args_size;

    registry::with_producer_queue(|queue| match queue.reserve_write(total) {
        Some(slot) => {
            let header = RecordHeader {
                timestamp,
                decoder: decode_record::<A>,
                args_size: args_size as u32,
                level: level as u8,
            };
            header.write_to(slot);
            let mut pos = HEADER_SIZE;
            pos += encode_str_ref(fmt, &mut slot[pos..]);
            args.encode(&mut slot[pos..]);
            queue.commit_write(total);
        }
        None => registry::count_drop(),
    });
}
