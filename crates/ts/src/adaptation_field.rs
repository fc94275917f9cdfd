/// Adaptation field flag byte, decoded.
///
/// Only the flags the splice analysis needs are exposed; optional fields
/// (PCR, OPCR, private data) are not walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptationField {
    pub discontinuity_indicator: bool,
    /// Random access point, set on I-frame PES starts
    pub random_access_indicator: bool,
    pub elementary_stream_priority_indicator: bool,
    pub pcr_flag: bool,
    pub splicing_point_flag: bool,
}

impl AdaptationField {
    /// Parse an adaptation field from its data bytes (after the length byte).
    ///
    /// An empty adaptation field (length 0) carries no flags and yields `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let flags = *data.first()?;
        Some(AdaptationField {
            discontinuity_indicator: (flags & 0x80) != 0,
            random_access_indicator: (flags & 0x40) != 0,
            elementary_stream_priority_indicator: (flags & 0x20) != 0,
            pcr_flag: (flags & 0x10) != 0,
            splicing_point_flag: (flags & 0x04) != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let af = AdaptationField::parse(&[0xD4]).unwrap();
        assert!(af.discontinuity_indicator);
        assert!(af.random_access_indicator);
        assert!(!af.elementary_stream_priority_indicator);
        assert!(af.pcr_flag);
        assert!(af.splicing_point_flag);
    }

    #[test]
    fn test_empty() {
        assert!(AdaptationField::parse(&[]).is_none());
    }
}
