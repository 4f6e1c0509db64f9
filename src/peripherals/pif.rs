// PIF: boot ROM/RAM and the joybus command interpreter. On a commanded run
// (byte 0x3f of PIF RAM set), each connected controller port's command
// block is decoded and answered in place, matching the wire protocol real
// controllers speak.

use crate::backend::InputSource;

pub const PIF_RAM_SIZE: usize = 64;

pub struct Pif {
    pub rom: Vec<u8>,
    pub ram: [u8; PIF_RAM_SIZE],
}

impl Pif {
    pub fn new(rom: Vec<u8>) -> Self {
        Pif { rom, ram: [0; PIF_RAM_SIZE] }
    }

    pub fn read_rom(&self, offset: u32) -> u8 {
        self.rom.get(offset as usize).copied().unwrap_or(0)
    }

    /// Byte 0x3f of PIF RAM set to 0x01 commands a run; the CPU polls for
    /// it to drop back to 0x00 to know the PIF finished.
    pub fn commanded(&self) -> bool {
        self.ram[0x3f] & 0x01 != 0
    }

    /// Walks the four-channel joybus command block, answering each
    /// present command in place, then clears the command byte.
    pub fn run_commands(&mut self, input: &mut dyn InputSource) {
        let mut pos = 0usize;
        let mut channel = 0usize;
        while pos < PIF_RAM_SIZE - 1 && channel < 4 {
            let tx_len = self.ram[pos];
            if tx_len == 0xfe {
                break; // end of channel list
            }
            if tx_len & 0x80 != 0 || tx_len == 0 {
                pos += 1;
                channel += 1;
                continue;
            }
            let rx_len = self.ram[pos + 1];
            let tx_start = pos + 2;
            let rx_start = tx_start + tx_len as usize;
            if rx_start + rx_len as usize > PIF_RAM_SIZE {
                break;
            }
            let command = self.ram[tx_start];
            let state = input.poll(channel);
            let reply = joybus_reply(command, state);
            for (i, b) in reply.iter().take(rx_len as usize).enumerate() {
                self.ram[rx_start + i] = *b;
            }
            pos = rx_start + rx_len as usize;
            channel += 1;
        }
        self.ram[0x3f] = 0;
    }
}

fn joybus_reply(command: u8, state: crate::backend::ControllerState) -> Vec<u8> {
    match command {
        0x00 | 0xff => vec![0x05, 0x00, 0x01], // device type, device type, no pak installed
        0x01 => {
            let buttons = state.buttons.to_be_bytes();
            vec![buttons[0], buttons[1], state.stick_x as u8, state.stick_y as u8]
        }
        0x02 => vec![0; 33], // accessory read: 32 data bytes + CRC, zeroed (no pak)
        0x03 => vec![0],     // accessory write ack
        0x04 => vec![0; 33], // EEPROM read block
        0x05 => vec![0],     // EEPROM write ack
        0x06 => vec![0; 3],  // RTC: zeroed clock
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullInputSource;

    #[test]
    fn info_command_reports_no_pak() {
        let mut pif = Pif::new(vec![0; 0x1000]);
        pif.ram[0] = 1; // tx_len
        pif.ram[1] = 3; // rx_len
        pif.ram[2] = 0x00; // command byte
        pif.ram[5] = 0xfe; // terminate channel list
        pif.ram[0x3f] = 1;
        let mut input = NullInputSource;
        pif.run_commands(&mut input);
        assert_eq!(&pif.ram[3..6], &[0x05, 0x00, 0x01]);
        assert_eq!(pif.ram[0x3f], 0);
    }
}
