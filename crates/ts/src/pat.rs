use crate::{Result, TsError};

/// PAT table id
pub const PAT_TABLE_ID: u8 = 0x00;

/// One program entry of a PAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatProgram {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// Program Association Table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    pub transport_stream_id: u16,
    pub version_number: u8,
    /// Programs with a non-zero program_number
    pub programs: Vec<PatProgram>,
    /// PID announced for program_number 0, if any
    pub network_pid: Option<u16>,
}

impl Pat {
    /// Parse a complete PAT section (header through CRC_32).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(TsError::short(12, data.len()));
        }
        if data[0] != PAT_TABLE_ID {
            return Err(TsError::InvalidTableId {
                expected: PAT_TABLE_ID,
                actual: data[0],
            });
        }

        let section_length = (((data[1] as usize) & 0x0F) << 8) | data[2] as usize;
        if section_length < 9 {
            return Err(TsError::InvalidSectionLength {
                table_id: PAT_TABLE_ID,
                length: section_length,
            });
        }
        if data.len() < section_length + 3 {
            return Err(TsError::short(section_length + 3, data.len()));
        }

        let transport_stream_id = ((data[3] as u16) << 8) | data[4] as u16;
        let version_number = (data[5] >> 1) & 0x1F;

        // Entries sit between the 8-byte long header and the CRC_32.
        let entries = &data[8..section_length + 3 - 4];
        let mut programs = Vec::with_capacity(entries.len() / 4);
        let mut network_pid = None;
        for entry in entries.chunks_exact(4) {
            let program_number = ((entry[0] as u16) << 8) | entry[1] as u16;
            let pid = ((entry[2] as u16 & 0x1F) << 8) | entry[3] as u16;
            if program_number == 0 {
                network_pid = Some(pid);
            } else {
                programs.push(PatProgram {
                    program_number,
                    pmt_pid: pid,
                });
            }
        }

        Ok(Pat {
            transport_stream_id,
            version_number,
            programs,
            network_pid,
        })
    }

    /// PMT PIDs in table order.
    pub fn pmt_pids(&self) -> impl Iterator<Item = u16> + '_ {
        self.programs.iter().map(|p| p.pmt_pid)
    }
}
