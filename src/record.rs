use crate::outbuf::LineWriter;

/// Consumer-side counterpart of an encoded record: reads the payload and
/// formats it straight into the staging buffer. One instantiation exists per
/// call-site argument shape; the header names it by address.
pub type DecodeFn = fn(&[u8], &mut LineWriter<'_>);

pub const HEADER_SIZE: usize = 24;

const TIMESTAMP_OFFSET: usize = 0;
const DECODER_OFFSET: usize = 8;
const ARGS_SIZE_OFFSET: usize = 16;
const LEVEL_OFFSET: usize = 20;

/// Fixed-layout record header: timestamp, decoder address, payload length,
/// level, three bytes of padding to 8-byte alignment.
#[derive(Clone, Copy)]
pub struct RecordHeader {
    pub timestamp: u64,
    pub decoder: DecodeFn,
    pub args_size: u32,
    pub level: u8,
}

impl RecordHeader {
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8].copy_from_slice(&self.timestamp.to_ne_bytes());
        buf[DECODER_OFFSET..DECODER_OFFSET + 8]
            .copy_from_slice(&(self.decoder as usize).to_ne_bytes());
        buf[ARGS_SIZE_OFFSET..ARGS_SIZE_OFFSET + 4].copy_from_slice(&self.args_size.to_ne_bytes());
        buf[LEVEL_OFFSET] = self.level;
        buf[LEVEL_OFFSET + 1..HEADER_SIZE].fill(0);
    }

    pub fn read_from(buf: &[u8]) -> Self {
        let timestamp = u64::from_ne_bytes(
            buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8]
                .try_into()
                .expect("slice length"),
        );
        let raw_decoder = usize::from_ne_bytes(
            buf[DECODER_OFFSET..DECODER_OFFSET + 8]
                .try_into()
                .expect("slice length"),
        );
        let args_size = u32::from_ne_bytes(
            buf[ARGS_SIZE_OFFSET..ARGS_SIZE_OFFSET + 4]
                .try_into()
                .expect("slice length"),
        );
        // SAFETY: the producer in this process stored a valid `DecodeFn`
        // address at this offset; fn pointers are usize-wide on every
        // supported target.
        let decoder = unsafe { std::mem::transmute::<usize, DecodeFn>(raw_decoder) };

        Self {
            timestamp,
            decoder,
            args_size,
            level: buf[LEVEL_OFFSET],
        }
    }

    /// Timestamp alone, for the consumer's minimum-timestamp scan.
    #[inline]
    pub fn peek_timestamp(buf: &[u8]) -> u64 {
        u64::from_ne_bytes(
            buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8]
                .try_into()
                .expect("slice length"),
        )
    }
}
