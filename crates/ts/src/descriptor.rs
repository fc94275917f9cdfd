/// Registration descriptor (tag 0x05)
pub const TAG_REGISTRATION: u8 = 0x05;
/// ISO 639 language descriptor (tag 0x0A)
pub const TAG_ISO_639_LANGUAGE: u8 = 0x0A;
/// SCTE-35 cue identifier descriptor (tag 0x8A, decimal 138)
pub const TAG_CUE_IDENTIFIER: u8 = 0x8A;

/// SCTE-35 registration format identifier
pub const CUEI: [u8; 4] = *b"CUEI";

/// One descriptor in a TLV loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor<'a> {
    pub tag: u8,
    pub data: &'a [u8],
}

/// Iterator over descriptors in a TLV descriptor loop.
///
/// Each descriptor is `[tag: u8][length: u8][data: length bytes]`. A
/// descriptor whose length runs past the loop ends iteration.
#[derive(Debug, Clone)]
pub struct Descriptors<'a> {
    data: &'a [u8],
}

impl<'a> Descriptors<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Descriptors { data }
    }
}

impl<'a> Iterator for Descriptors<'a> {
    type Item = Descriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let [tag, length, rest @ ..] = self.data else {
            return None;
        };
        let length = *length as usize;
        if rest.len() < length {
            self.data = &[];
            return None;
        }
        let (data, remaining) = rest.split_at(length);
        self.data = remaining;
        Some(Descriptor { tag: *tag, data })
    }
}

/// Format identifier of a registration descriptor.
pub fn registration_format(data: &[u8]) -> Option<[u8; 4]> {
    data.get(..4)?.try_into().ok()
}
