//! # SmartPort bus
//!
//! Block devices share the disk port with the 5.25 inch drives.  The host
//! enables the bus with PH1+PH3, resets it with PH0+PH2, and exchanges
//! packets whose bytes always carry the high bit, 7-to-8 encoded.  The bus
//! shifts bits off the same write signal a drive head would see and
//! answers by pulsing the read line one bit cell at a time, so the IWM
//! needs no special casing beyond yielding the port while a unit responds.
//!
//! The packet set is the minimum a block device needs: INIT, STATUS,
//! READ BLOCK and WRITE BLOCK.  Anything fancier (tape, character
//! devices) belongs to the host.

use log::{debug,warn};

use super::flags;

const PACKET_BEGIN: u8 = 0xc3;
const PACKET_END: u8 = 0xc8;
const SYNC_BYTE: u8 = 0xff;

const TYPE_COMMAND: u8 = 0x80;
const TYPE_STATUS: u8 = 0x81;
const TYPE_DATA: u8 = 0x82;

const CMD_STATUS: u8 = 0x00;
const CMD_READ_BLOCK: u8 = 0x01;
const CMD_WRITE_BLOCK: u8 = 0x02;
const CMD_FORMAT: u8 = 0x03;
const CMD_INIT: u8 = 0x05;

const BLOCK_SIZE: usize = 512;

/// A block-addressed unit on the bus; 2MG and raw ProDOS-ordered images
/// both reduce to this.
pub trait BlockDevice {
    /// SmartPort device id byte (e.g. hard disk = 0x02)
    fn device_id(&self) -> u8;
    fn block_count(&self) -> u32;
    fn read_block(&mut self,index: u32,buf: &mut [u8]) -> bool;
    fn write_block(&mut self,index: u32,buf: &[u8]) -> bool;
}

/// In-memory ProDOS-ordered block store
pub struct BlockDisk {
    data: Vec<u8>
}

impl BlockDisk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl BlockDevice for BlockDisk {
    fn device_id(&self) -> u8 {
        0x02
    }
    fn block_count(&self) -> u32 {
        (self.data.len() / BLOCK_SIZE) as u32
    }
    fn read_block(&mut self,index: u32,buf: &mut [u8]) -> bool {
        let start = index as usize * BLOCK_SIZE;
        if start + BLOCK_SIZE > self.data.len() || buf.len() < BLOCK_SIZE {
            return false;
        }
        buf[..BLOCK_SIZE].copy_from_slice(&self.data[start..start + BLOCK_SIZE]);
        true
    }
    fn write_block(&mut self,index: u32,buf: &[u8]) -> bool {
        let start = index as usize * BLOCK_SIZE;
        if start + BLOCK_SIZE > self.data.len() || buf.len() < BLOCK_SIZE {
            return false;
        }
        self.data[start..start + BLOCK_SIZE].copy_from_slice(&buf[..BLOCK_SIZE]);
        true
    }
}

pub struct SmartPortUnit {
    pub unit_id: u8,
    pub device: Option<Box<dyn BlockDevice>>
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
enum BusState {
    Idle,
    Listening,
    Responding
}

/// 7-to-8 encode: a run of 7 data bytes becomes one byte of MSBs followed
/// by the 7 bytes with their high bits forced on.
fn encode_groups(payload: &[u8],out: &mut Vec<u8>) -> (u8,u8) {
    let odd_count = (payload.len() % 7) as u8;
    let group_count = (payload.len() / 7) as u8;
    let mut idx = 0;
    if odd_count > 0 {
        let mut msbs = 0x80u8;
        for bit in 0..odd_count {
            if payload[idx + bit as usize] & 0x80 != 0 {
                msbs |= 0x40 >> bit;
            }
        }
        out.push(msbs);
        for bit in 0..odd_count {
            out.push(payload[idx + bit as usize] | 0x80);
        }
        idx += odd_count as usize;
    }
    for _ in 0..group_count {
        let mut msbs = 0x80u8;
        for bit in 0..7 {
            if payload[idx + bit] & 0x80 != 0 {
                msbs |= 0x40 >> bit;
            }
        }
        out.push(msbs);
        for bit in 0..7 {
            out.push(payload[idx + bit] | 0x80);
        }
        idx += 7;
    }
    (odd_count,group_count)
}

fn decode_groups(encoded: &[u8],odd_count: u8,group_count: u8) -> Option<Vec<u8>> {
    let needed = odd_count as usize + (odd_count > 0) as usize
        + group_count as usize * 8;
    if encoded.len() < needed {
        return None;
    }
    let mut out = Vec::new();
    let mut idx = 0;
    if odd_count > 0 {
        let msbs = encoded[idx];
        idx += 1;
        for bit in 0..odd_count as usize {
            let mut byte = encoded[idx + bit] & 0x7f;
            if msbs & (0x40 >> bit) != 0 {
                byte |= 0x80;
            }
            out.push(byte);
        }
        idx += odd_count as usize;
    }
    for _ in 0..group_count {
        let msbs = encoded[idx];
        idx += 1;
        for bit in 0..7 {
            let mut byte = encoded[idx + bit] & 0x7f;
            if msbs & (0x40 >> bit) != 0 {
                byte |= 0x80;
            }
            out.push(byte);
        }
        idx += 7;
    }
    Some(out)
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8,|acc,b| acc ^ b)
}

pub struct SmartPortBus {
    units: Vec<SmartPortUnit>,
    state: BusState,
    next_unit_id: u8,
    rx_shift: u16,
    rx_bytes: Vec<u8>,
    tx_bits: Vec<bool>,
    tx_bit_index: usize,
    write_signal_prev: bool,
    pending_write: Option<(u8,u32)>
}

impl SmartPortBus {
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            state: BusState::Idle,
            next_unit_id: 1,
            rx_shift: 0,
            rx_bytes: Vec::new(),
            tx_bits: Vec::new(),
            tx_bit_index: 0,
            write_signal_prev: false,
            pending_write: None
        }
    }
    pub fn reset(&mut self) {
        self.state = BusState::Idle;
        self.next_unit_id = 1;
        self.rx_shift = 0;
        self.rx_bytes.clear();
        self.tx_bits.clear();
        self.tx_bit_index = 0;
        self.pending_write = None;
        for unit in self.units.iter_mut() {
            unit.unit_id = 0;
        }
    }
    pub fn attach(&mut self,device: Box<dyn BlockDevice>) {
        self.units.push(SmartPortUnit { unit_id: 0,device: Some(device) });
    }
    pub fn detach_all(&mut self) {
        self.units.clear();
    }
    pub fn has_device(&self) -> bool {
        self.units.iter().any(|u| u.device.is_some())
    }

    fn unit_by_id(&mut self,unit_id: u8) -> Option<&mut SmartPortUnit> {
        self.units.iter_mut().find(|u| u.unit_id == unit_id)
    }

    fn queue_response(&mut self,dest: u8,packet_type: u8,stat: u8,payload: &[u8]) {
        let mut bytes = vec![SYNC_BYTE;4];
        bytes.push(PACKET_BEGIN);
        bytes.push(0x80 | dest);
        bytes.push(0x80 | 0x00);        // src: the bus itself
        bytes.push(packet_type);
        bytes.push(0x80);               // aux
        bytes.push(0x80 | stat);
        let mut encoded = Vec::new();
        let (odd,groups) = encode_groups(payload,&mut encoded);
        bytes.push(0x80 | odd);
        bytes.push(0x80 | groups);
        bytes.extend_from_slice(&encoded);
        let sum = checksum(&bytes[5..]);
        // checksum rides in two bytes, alternating bits forced high
        bytes.push(sum | 0xaa);
        bytes.push((sum >> 1) | 0xaa);
        bytes.push(PACKET_END);
        // serialize MSB-first, one bit per cell
        self.tx_bits.clear();
        for byte in bytes {
            for bit in (0..8).rev() {
                self.tx_bits.push(byte & (1 << bit) != 0);
            }
        }
        self.tx_bit_index = 0;
        self.state = BusState::Responding;
    }

    fn handle_command(&mut self,dest: u8,payload: &[u8]) {
        if payload.is_empty() {
            return;
        }
        let cmd = payload[0];
        match cmd {
            CMD_INIT => {
                // assign the next id to the first unnumbered unit
                let id = self.next_unit_id;
                let last = {
                    let mut assigned = false;
                    for unit in self.units.iter_mut() {
                        if unit.unit_id == 0 {
                            unit.unit_id = id;
                            assigned = true;
                            break;
                        }
                    }
                    if assigned {
                        self.next_unit_id += 1;
                    }
                    !self.units.iter().any(|u| u.unit_id == 0)
                };
                debug!("smartport: init assigned unit {}",id);
                // stat 0xff until the last device in the chain acks
                self.queue_response(0,TYPE_STATUS,if last { 0x00 } else { 0xff },&[]);
            },
            CMD_STATUS => {
                let code = payload.get(2).copied().unwrap_or(0);
                let (block_count,present) = match self.unit_by_id(dest) {
                    Some(unit) => match unit.device.as_ref() {
                        Some(dev) => (dev.block_count(),true),
                        None => (0,false)
                    },
                    None => (0,false)
                };
                match code {
                    0x00 | 0x03 => {
                        let status = if present { 0xf8 } else { 0x80 };
                        let response = [
                            status,
                            block_count as u8,
                            (block_count >> 8) as u8,
                            (block_count >> 16) as u8
                        ];
                        self.queue_response(dest,TYPE_STATUS,0,&response);
                    },
                    _ => {
                        warn!("smartport: status code {:02X} unsupported",code);
                        self.queue_response(dest,TYPE_STATUS,0x21,&[]);
                    }
                }
            },
            CMD_READ_BLOCK => {
                let block = u32::from_le_bytes([
                    payload.get(4).copied().unwrap_or(0),
                    payload.get(5).copied().unwrap_or(0),
                    payload.get(6).copied().unwrap_or(0),
                    0
                ]);
                let mut buf = vec![0u8;BLOCK_SIZE];
                let ok = match self.unit_by_id(dest) {
                    Some(unit) => match unit.device.as_mut() {
                        Some(dev) => dev.read_block(block,&mut buf),
                        None => false
                    },
                    None => false
                };
                if ok {
                    self.queue_response(dest,TYPE_DATA,0,&buf);
                } else {
                    warn!("smartport: read block {} failed",block);
                    self.queue_response(dest,TYPE_STATUS,0x27,&[]);
                }
            },
            CMD_WRITE_BLOCK => {
                let block = u32::from_le_bytes([
                    payload.get(4).copied().unwrap_or(0),
                    payload.get(5).copied().unwrap_or(0),
                    payload.get(6).copied().unwrap_or(0),
                    0
                ]);
                // the data packet follows; remember where it goes
                self.pending_write = Some((dest,block));
                self.queue_response(dest,TYPE_STATUS,0,&[]);
            },
            CMD_FORMAT => {
                self.queue_response(dest,TYPE_STATUS,0,&[]);
            },
            _ => {
                warn!("smartport: command {:02X} unsupported",cmd);
                self.queue_response(dest,TYPE_STATUS,0x01,&[]);
            }
        }
    }

    fn handle_data(&mut self,payload: &[u8]) {
        if let Some((dest,block)) = self.pending_write.take() {
            let ok = match self.unit_by_id(dest) {
                Some(unit) => match unit.device.as_mut() {
                    Some(dev) => dev.write_block(block,payload),
                    None => false
                },
                None => false
            };
            self.queue_response(dest,TYPE_STATUS,if ok { 0 } else { 0x27 },&[]);
        }
    }

    fn parse_packet(&mut self) {
        // find PBEGIN, strip sync bytes
        let begin = match self.rx_bytes.iter().position(|b| *b == PACKET_BEGIN) {
            Some(idx) => idx,
            None => return
        };
        let packet = self.rx_bytes[begin..].to_vec();
        if packet.len() < 9 {
            return;
        }
        let dest = packet[1] & 0x7f;
        let packet_type = packet[3];
        let odd_count = packet[6] & 0x7f;
        let group_count = packet[7] & 0x7f;
        let encoded = &packet[8..packet.len() - 1];
        let payload = match decode_groups(encoded,odd_count,group_count) {
            Some(p) => p,
            None => return
        };
        self.rx_bytes.clear();
        self.rx_shift = 0;
        match packet_type {
            TYPE_COMMAND => self.handle_command(dest,&payload),
            TYPE_DATA => self.handle_data(&payload),
            _ => {
                warn!("smartport: packet type {:02X} ignored",packet_type);
            }
        }
    }

    /// One bus tick per bit cell.  Returns true while the bus owns the
    /// disk port (which parks the 5.25 inch drives).
    pub fn bus(&mut self,io_flags: &mut u32,out_phase: &mut u32,
               data: &mut u8,_bit_cell_ns: u32) -> bool {
        if !self.has_device() {
            return false;
        }
        let ph = *out_phase & 0xf;
        // bus reset: PH0+PH2 up, PH1+PH3 down
        if ph & 0x5 == 0x5 && ph & 0xa == 0 {
            if self.state != BusState::Idle || self.next_unit_id != 1 {
                debug!("smartport: bus reset");
                self.reset();
            }
            return true;
        }
        // bus enabled: PH1+PH3 up
        if ph & 0xa != 0xa {
            self.state = BusState::Idle;
            self.write_signal_prev = false;
            return false;
        }
        match self.state {
            BusState::Idle | BusState::Listening => {
                self.state = BusState::Listening;
                // shift host write transitions in as bits, MSB first
                let signal = *io_flags & flags::WRITE_HEAD_ON == flags::WRITE_HEAD_ON;
                let bit = signal != self.write_signal_prev;
                self.write_signal_prev = signal;
                self.rx_shift = (self.rx_shift << 1) | bit as u16;
                if self.rx_shift & 0x80 != 0 {
                    let byte = (self.rx_shift & 0xff) as u8;
                    self.rx_shift = 0;
                    self.rx_bytes.push(byte);
                    if byte == PACKET_END {
                        self.parse_packet();
                    }
                }
            },
            BusState::Responding => {
                // drive the read line with the queued packet
                if self.tx_bit_index < self.tx_bits.len() {
                    if self.tx_bits[self.tx_bit_index] {
                        *io_flags |= flags::READ_DATA;
                    } else {
                        *io_flags &= !flags::READ_DATA;
                    }
                    self.tx_bit_index += 1;
                    // mirror assembled bytes onto the data register for
                    // hosts that poll it directly
                    if self.tx_bit_index % 8 == 0 {
                        let byte_idx = self.tx_bit_index / 8 - 1;
                        let mut byte = 0u8;
                        for bit in 0..8 {
                            byte = (byte << 1)
                                | self.tx_bits[byte_idx * 8 + bit] as u8;
                        }
                        *data = byte;
                    }
                } else {
                    self.state = BusState::Listening;
                    self.rx_bytes.clear();
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_encoding_round_trip() {
        let payload: Vec<u8> = (0u8..23).map(|b| b.wrapping_mul(11) ^ 0x91).collect();
        let mut encoded = Vec::new();
        let (odd,groups) = encode_groups(&payload,&mut encoded);
        assert_eq!(odd,2);
        assert_eq!(groups,3);
        assert!(encoded.iter().all(|b| b & 0x80 != 0));
        let decoded = decode_groups(&encoded,odd,groups).expect("decode");
        assert_eq!(decoded,payload);
    }

    #[test]
    fn block_disk_round_trip() {
        let mut disk = BlockDisk::new(vec![0;BLOCK_SIZE * 4]);
        assert_eq!(disk.block_count(),4);
        let block: Vec<u8> = (0..BLOCK_SIZE).map(|i| (i & 0xff) as u8).collect();
        assert!(disk.write_block(2,&block));
        let mut readback = vec![0u8;BLOCK_SIZE];
        assert!(disk.read_block(2,&mut readback));
        assert_eq!(readback,block);
        assert!(!disk.read_block(4,&mut readback));
    }

    #[test]
    fn bus_claims_port_only_when_enabled() {
        let mut bus = SmartPortBus::new();
        let mut io_flags = 0u32;
        let mut data = 0u8;
        let mut phase = 0u32;
        // no devices: never active
        assert!(!bus.bus(&mut io_flags,&mut phase,&mut data,4000));
        bus.attach(Box::new(BlockDisk::new(vec![0;BLOCK_SIZE * 8])));
        // phases idle: not active
        assert!(!bus.bus(&mut io_flags,&mut phase,&mut data,4000));
        // PH1+PH3: enabled
        phase = 0xa;
        assert!(bus.bus(&mut io_flags,&mut phase,&mut data,4000));
    }

    #[test]
    fn init_assigns_ids() {
        let mut bus = SmartPortBus::new();
        bus.attach(Box::new(BlockDisk::new(vec![0;BLOCK_SIZE * 8])));
        bus.attach(Box::new(BlockDisk::new(vec![0;BLOCK_SIZE * 8])));
        bus.handle_command(0,&[CMD_INIT]);
        assert_eq!(bus.units[0].unit_id,1);
        assert_eq!(bus.units[1].unit_id,0);
        bus.handle_command(0,&[CMD_INIT]);
        assert_eq!(bus.units[1].unit_id,2);
    }

    #[test]
    fn read_block_queues_data_packet() {
        let mut bus = SmartPortBus::new();
        let mut image = vec![0u8;BLOCK_SIZE * 8];
        image[BLOCK_SIZE * 3] = 0x42;
        bus.attach(Box::new(BlockDisk::new(image)));
        bus.handle_command(0,&[CMD_INIT]);
        bus.tx_bits.clear();
        // read block 3 of unit 1 (params: cmd,unit,ptr lo,ptr hi,block x3)
        bus.handle_command(1,&[CMD_READ_BLOCK,1,0,0,3,0,0]);
        assert_eq!(bus.state,BusState::Responding);
        assert!(bus.tx_bits.len() > BLOCK_SIZE * 8);
    }
}
