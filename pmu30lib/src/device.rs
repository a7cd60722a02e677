//! The device side of the protocol: frame dispatch, configuration
//! apply, telemetry scheduling, and the executor driver.

use core::fmt::Write as _;

use crate::channel::{
    self, Channel, ChannelFlags, ChannelKind, SYS_BATTERY_MV, SYS_BOARD_TEMP1, SYS_BOARD_TEMP2,
    SYS_MCU_TEMP, SYS_STATUS, SYS_TOTAL_CURRENT_MA, SYS_UPTIME_S,
};
use crate::config::codec::{BlobFlags, BlobReader, ChannelEntry, BLOB_HEADER_SIZE};
use crate::config::records::DUTY_FULL_SCALE;
use crate::config::{codec, validate, ChannelConfig, Limits};
use crate::engine::{Executor, Workspace};
use crate::error::ErrorCode;
use crate::hardware::{self, system_index, Flash, Hardware, HwDevice};
use crate::protocol::messages::{
    config as cfgmsg, runtime, system, telemetry as telmsg, MessageCommand,
};
use crate::protocol::parse::{MessageError, MessageParse};
use crate::protocol::serialize::{MessageSerialize, SerializerSlice};
use crate::protocol::telemetry::{
    Faults, HBridgeStatus, TelemetryFlags, TelemetryHeader, TelemetryPacket, Virtuals,
};
use crate::protocol::{Framer, HostMessage, MAX_FRAME_SIZE, MAX_PAYLOAD};
use crate::registry::{Registry, MAX_CHANNELS};

/// Largest configuration blob the device accepts.
pub const CONFIG_MAX: usize = 8192;

/// Chunk size used when streaming the configuration back to the host.
pub const READ_CHUNK: usize = 240;

const OUT_CAP: usize = 4096;

/// Outbound frame queue: length-prefixed frames in a flat buffer.
struct OutQueue {
    buf: [u8; OUT_CAP],
    start: usize,
    end: usize,
    dropped: u32,
}

impl OutQueue {
    fn new() -> Self {
        Self {
            buf: [0; OUT_CAP],
            start: 0,
            end: 0,
            dropped: 0,
        }
    }

    fn pending(&self) -> usize {
        self.end - self.start
    }

    fn room(&self) -> usize {
        OUT_CAP - self.pending()
    }

    fn push(&mut self, frame: &[u8]) -> bool {
        let need = frame.len() + 2;
        if self.end + need > OUT_CAP && self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        if self.end + need > OUT_CAP {
            self.dropped = self.dropped.wrapping_add(1);
            return false;
        }

        self.buf[self.end..self.end + 2].copy_from_slice(&(frame.len() as u16).to_le_bytes());
        self.buf[self.end + 2..self.end + need].copy_from_slice(frame);
        self.end += need;
        true
    }

    fn pop(&mut self, out: &mut [u8]) -> Option<usize> {
        if self.start == self.end {
            return None;
        }

        let len = u16::from_le_bytes([self.buf[self.start], self.buf[self.start + 1]]) as usize;
        if out.len() < len {
            return None;
        }
        out[..len].copy_from_slice(&self.buf[self.start + 2..self.start + 2 + len]);
        self.start += 2 + len;
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
        Some(len)
    }
}

/// Chunked blob upload in progress.
struct UploadState {
    active: bool,
    next_seq: u16,
    len: usize,
    buf: [u8; CONFIG_MAX],
}

impl UploadState {
    fn new() -> Self {
        Self {
            active: false,
            next_seq: 0,
            len: 0,
            buf: [0; CONFIG_MAX],
        }
    }

    fn reset(&mut self) {
        self.active = false;
        self.next_seq = 0;
        self.len = 0;
    }
}

/// Configuration readback in progress, streamed as the out queue
/// drains.
struct ReadState {
    active: bool,
    offset: usize,
    len: usize,
}

/// Telemetry subscription.
struct TelemetryState {
    active: bool,
    flags: TelemetryFlags,
    period_ms: u32,
    last_ms: u32,
    counter: u32,
}

/// Fixed-capacity text sink for formatted error messages.
struct FmtBuf {
    buf: [u8; 96],
    len: usize,
}

impl FmtBuf {
    fn new() -> Self {
        Self {
            buf: [0; 96],
            len: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl core::fmt::Write for FmtBuf {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let n = bytes.len().min(self.buf.len() - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        Ok(())
    }
}

/// The complete device core.
///
/// Feed received bytes with [push_byte][Device::push_byte], drain
/// responses with [pop_frame][Device::pop_frame], and drive the
/// engine with [run][Device::run] at the pass cadence.
pub struct Device {
    registry: Registry,
    executor: Executor,
    framer: Framer,
    limits: Limits,
    version: system::FirmwareVersion,
    serial: u32,
    out: OutQueue,
    upload: UploadState,
    read: ReadState,
    telem: TelemetryState,
    restart_pending: bool,
    degraded: bool,
    config_dirty: bool,
    booted_ms: u32,
}

impl Device {
    pub fn new(serial: u32, version: system::FirmwareVersion) -> Self {
        Self {
            registry: Registry::with_system_channels(),
            executor: Executor::new(),
            framer: Framer::new(),
            limits: Limits::default(),
            version,
            serial,
            out: OutQueue::new(),
            upload: UploadState::new(),
            read: ReadState {
                active: false,
                offset: 0,
                len: 0,
            },
            telem: TelemetryState {
                active: false,
                flags: TelemetryFlags::empty(),
                period_ms: 0,
                last_ms: 0,
                counter: 0,
            },
            restart_pending: false,
            degraded: false,
            config_dirty: false,
            booted_ms: 0,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// The device asked to be restarted; the collaborator reboots and
    /// calls [boot][Device::boot] again.
    pub fn restart_requested(&self) -> bool {
        self.restart_pending
    }

    /// The boot path refused the saved configuration.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Initialize from the saved configuration, falling back to
    /// defaults-only when the flash image or blob is refused. Queues
    /// the boot-complete frame either way.
    pub fn boot<F: Flash>(&mut self, flash: &mut F, now_ms: u32) {
        self.restart_pending = false;
        self.booted_ms = now_ms;
        self.executor.reset();
        self.upload.reset();
        self.read.active = false;

        self.degraded = self.load_saved(flash).is_err();

        let flags = if self.degraded {
            system::BOOT_FLAG_DEGRADED
        } else {
            0
        };
        self.queue(&system::BootComplete { flags });
    }

    fn load_saved<F: Flash>(&mut self, flash: &mut F) -> Result<(), ErrorCode> {
        let take = flash.capacity().min(CONFIG_MAX + hardware::FLASH_IMAGE_HEADER);
        let mut image = [0u8; CONFIG_MAX + hardware::FLASH_IMAGE_HEADER];
        flash
            .read(0, &mut image[..take])
            .map_err(|_| ErrorCode::InvalidLength)?;

        let blob = hardware::decode_image(&image[..take])?;
        self.apply_blob(blob).map_err(ErrorCode::from)
    }

    /// Feed one received byte. Completed frames are dispatched and
    /// responses queued.
    pub fn push_byte<H: Hardware, F: Flash>(&mut self, byte: u8, hw: &mut H, flash: &mut F) {
        let Some(frame) = self.framer.push_byte(byte) else {
            return;
        };

        let cmd = frame.cmd;
        let len = frame.payload.len();
        let mut payload = [0u8; MAX_PAYLOAD];
        payload[..len].copy_from_slice(frame.payload);

        self.handle_payload(cmd, &payload[..len], hw, flash);
    }

    /// Pop one outbound frame into `out`. Also advances a pending
    /// configuration readback while there is queue room.
    pub fn pop_frame(&mut self, out: &mut [u8]) -> Option<usize> {
        self.pump_read();
        self.out.pop(out)
    }

    pub fn pending_out(&self) -> usize {
        self.out.pending()
    }

    /// Outbound frames dropped because the queue was full. Unsolicited
    /// traffic is best effort.
    pub fn dropped_frames(&self) -> u32 {
        self.out.dropped
    }

    /// Abandon a half-finished chunked upload, for transport-level
    /// timeouts.
    pub fn reset_upload(&mut self) {
        self.upload.reset();
    }

    /// One cooperative tick: refresh system channels, run an executor
    /// pass, emit due telemetry, and persist dirty numbers.
    pub fn run<H: Hardware, F: Flash>(&mut self, hw: &mut H, flash: &mut F, now_ms: u32) {
        self.refresh_system(hw, now_ms);
        self.executor.pass(&mut self.registry, hw, now_ms);

        if self.telem.active
            && now_ms.wrapping_sub(self.telem.last_ms) >= self.telem.period_ms
        {
            self.telem.last_ms = now_ms;
            let packet = self.build_telemetry(hw, now_ms);
            self.queue(&telmsg::TelemetryData { packet });
        }

        if self.config_dirty {
            self.config_dirty = false;
            let _ = self.save_config(flash);
        }

        self.pump_read();
    }

    fn refresh_system<H: Hardware>(&mut self, hw: &mut H, now_ms: u32) {
        let reads = [
            (SYS_BATTERY_MV, system_index::BATTERY_MV),
            (SYS_TOTAL_CURRENT_MA, system_index::TOTAL_CURRENT_MA),
            (SYS_MCU_TEMP, system_index::MCU_TEMP),
            (SYS_BOARD_TEMP1, system_index::BOARD_TEMP1),
            (SYS_BOARD_TEMP2, system_index::BOARD_TEMP2),
            (SYS_STATUS, system_index::STATUS),
        ];
        for (id, index) in reads {
            let v = hw.read_input(HwDevice::System, index);
            self.registry.update_value(id, v);
        }
        self.registry
            .update_value(SYS_UPTIME_S, (now_ms.wrapping_sub(self.booted_ms) / 1000) as i32);
    }

    fn queue<M: MessageSerialize>(&mut self, msg: &M) {
        let mut scratch = [0u8; MAX_FRAME_SIZE];
        let mut ser = SerializerSlice::new(&mut scratch);
        if msg.frame(&mut ser).is_ok() {
            let len = ser.len();
            self.out.push(&scratch[..len]);
        }
    }

    fn ack(&mut self, cmd: u8) {
        self.queue(&system::Ack { cmd });
    }

    fn error(&mut self, code: ErrorCode, cmd: u8) {
        self.queue(&system::ErrorReply { code, cmd });
    }

    fn nack_code(&mut self, cmd: u8, code: ErrorCode) {
        let mut text = FmtBuf::new();
        let _ = write!(text, "{}", code);
        self.queue(&system::Nack {
            cmd,
            reason: text.as_bytes(),
        });
    }

    fn handle_payload<H: Hardware, F: Flash>(
        &mut self,
        cmd: u8,
        payload: &[u8],
        hw: &mut H,
        flash: &mut F,
    ) {
        let msg = match HostMessage::parse_payload(cmd, payload) {
            Ok(msg) => msg,
            Err(MessageError::UnknownCommand) => {
                self.error(ErrorCode::UnknownCommand, cmd);
                return;
            }
            Err(MessageError::Malformed) => {
                self.error(ErrorCode::InvalidLength, cmd);
                return;
            }
        };

        match msg {
            HostMessage::Ping(_) => self.queue(&system::Pong),

            HostMessage::GetVersion(_) => {
                let version = self.version;
                self.queue(&system::Version { version });
            }

            HostMessage::GetSerial(_) => {
                let serial = self.serial;
                self.queue(&system::Serial { serial });
            }

            HostMessage::GetCapabilities(_) => {
                let caps = self.capabilities();
                self.queue(&caps);
            }

            HostMessage::ConfigChunk(chunk) => self.handle_config_chunk(chunk, flash),

            HostMessage::ApplySavedConfig(_) => match self.load_saved(flash) {
                Ok(()) => {
                    self.degraded = false;
                    self.ack(cmd);
                }
                Err(code) => self.nack_code(cmd, code),
            },

            HostMessage::ReadConfig(_) => self.handle_read_config(cmd),

            HostMessage::SetChannelConfig(msg) => self.handle_set_channel(msg.entry, flash),

            HostMessage::GetChannelValue(msg) => {
                let value = self.registry.get_value(msg.id);
                self.queue(&runtime::ChannelValue { id: msg.id, value });
            }

            HostMessage::ForceChannel(msg) => self.handle_force(cmd, msg),

            HostMessage::SetOutput(msg) => {
                if (msg.index as usize) >= channel::NUM_POWER_OUTPUTS {
                    self.error(ErrorCode::InvalidChannelId, cmd);
                    return;
                }
                hw.write_output(HwDevice::PowerOut, msg.index, (msg.on != 0) as i32);
                self.ack(cmd);
            }

            HostMessage::SetPwm(msg) => {
                if (msg.index as usize) >= channel::NUM_POWER_OUTPUTS {
                    self.error(ErrorCode::InvalidChannelId, cmd);
                    return;
                }
                let duty = (msg.duty as i32).min(DUTY_FULL_SCALE);
                hw.write_output(HwDevice::PwmOut, msg.index, duty);
                self.ack(cmd);
            }

            HostMessage::SetHBridge(msg) => {
                if (msg.index as usize) >= channel::NUM_HBRIDGES {
                    self.error(ErrorCode::InvalidChannelId, cmd);
                    return;
                }
                let value = (msg.value as i32).clamp(-DUTY_FULL_SCALE, DUTY_FULL_SCALE);
                hw.write_output(HwDevice::HBridge, msg.index, value);
                self.ack(cmd);
            }

            HostMessage::TelemetrySubscribe(msg) => {
                self.telem.active = true;
                self.telem.flags = msg.flags;
                // the rate hint is bounded by the pass cadence
                self.telem.period_ms = (msg.rate_ms as u32).max(10);
                self.ack(cmd);
            }

            HostMessage::TelemetryUnsubscribe(_) => {
                self.telem.active = false;
                self.ack(cmd);
            }

            HostMessage::Restart(_) => {
                self.restart_pending = true;
                self.queue(&system::RestartAck);
            }
        }
    }

    fn capabilities(&self) -> system::Capabilities {
        let stats = self.framer.stats();
        system::Capabilities {
            hardware_flags: 0,
            software_flags: 0,
            power_outputs: channel::NUM_POWER_OUTPUTS as u8,
            pwm_outputs: channel::NUM_POWER_OUTPUTS as u8,
            hbridges: channel::NUM_HBRIDGES as u8,
            digital_inputs: channel::NUM_DIGITAL_INPUTS as u8,
            analog_inputs: channel::NUM_ANALOG_INPUTS as u8,
            frequency_inputs: channel::NUM_FREQUENCY_INPUTS as u8,
            can_buses: channel::NUM_CAN_BUSES as u8,
            _pad: Default::default(),
            max_channels: MAX_CHANNELS as u16,
            max_virtuals: (channel::VIRTUAL_ID_MAX - channel::VIRTUAL_ID_MIN + 1),
            config_flash_size: CONFIG_MAX as u32,
            config_ram_size: CONFIG_MAX as u32,
            total_current_limit_ma: 60_000,
            channel_current_limit_ma: 25_000,
            frames_received: stats.frames_ok,
            framing_errors: stats.framing_errors,
            crc_errors: stats.crc_errors,
            serial: self.serial,
            _reserved: Default::default(),
        }
    }

    fn handle_config_chunk<F: Flash>(&mut self, chunk: cfgmsg::ConfigChunk<&[u8]>, flash: &mut F) {
        let cmd = cfgmsg::ConfigChunk::<&[u8]>::CMD;

        if chunk.seq == 0 {
            self.upload.reset();
            self.upload.active = true;
        }

        if !self.upload.active {
            self.queue(&cfgmsg::ConfigChunkAck {
                seq: chunk.seq,
                code: ErrorCode::Busy,
            });
            return;
        }
        if chunk.seq != self.upload.next_seq {
            self.upload.reset();
            self.queue(&cfgmsg::ConfigChunkAck {
                seq: chunk.seq,
                code: ErrorCode::InvalidLength,
            });
            return;
        }
        if self.upload.len + chunk.data.len() > CONFIG_MAX {
            self.upload.reset();
            self.queue(&cfgmsg::ConfigChunkAck {
                seq: chunk.seq,
                code: ErrorCode::BufferTooSmall,
            });
            return;
        }

        self.upload.buf[self.upload.len..self.upload.len + chunk.data.len()]
            .copy_from_slice(chunk.data);
        self.upload.len += chunk.data.len();
        self.upload.next_seq = self.upload.next_seq.wrapping_add(1);
        self.queue(&cfgmsg::ConfigChunkAck {
            seq: chunk.seq,
            code: ErrorCode::None,
        });

        // a complete blob applies immediately
        if self.upload.len < BLOB_HEADER_SIZE {
            return;
        }
        let Ok((_, header)) = codec::BlobHeader::parse(&self.upload.buf[..BLOB_HEADER_SIZE])
        else {
            return;
        };
        let total = header.total_size as usize;
        if total > CONFIG_MAX {
            self.upload.reset();
            self.nack_code(cmd, ErrorCode::InvalidLength);
            return;
        }
        if self.upload.len < total {
            return;
        }
        if self.upload.len > total {
            self.upload.reset();
            self.nack_code(cmd, ErrorCode::InvalidLength);
            return;
        }

        // the borrow checker cannot see through self.apply_blob while
        // the blob lives in self.upload, so stage it
        let mut blob = [0u8; CONFIG_MAX];
        blob[..total].copy_from_slice(&self.upload.buf[..total]);
        self.upload.reset();

        match self.apply_blob(&blob[..total]) {
            Ok(()) => {
                self.degraded = false;
                match self.save_config(flash) {
                    Ok(()) => self.ack(cmd),
                    Err(code) => self.nack_code(cmd, code),
                }
            }
            Err(err) => self.nack_apply(cmd, &err),
        }
    }

    fn nack_apply(&mut self, cmd: u8, err: &ApplyError) {
        match err {
            ApplyError::Blob(e) => {
                let mut text = FmtBuf::new();
                let _ = write!(text, "{}", e);
                self.queue(&system::Nack {
                    cmd,
                    reason: text.as_bytes(),
                });
            }
            ApplyError::Validate(id, e) => {
                let mut text = FmtBuf::new();
                let _ = write!(text, "channel {}: {}", id, e);
                self.queue(&system::Nack {
                    cmd,
                    reason: text.as_bytes(),
                });
            }
        }
    }

    /// Parse, validate, and apply a configuration blob. The prior
    /// configuration stays untouched unless every entry validates.
    fn apply_blob(&mut self, blob: &[u8]) -> Result<(), ApplyError> {
        let reader = BlobReader::new(blob).map_err(ApplyError::Blob)?;
        let header = *reader.header();

        if header.flags.intersects(BlobFlags::COMPRESSED | BlobFlags::ENCRYPTED) {
            return Err(ApplyError::Blob(codec::BlobError {
                code: ErrorCode::VersionMismatch,
                id: 0,
            }));
        }
        if header.device_type != crate::DEVICE_TYPE {
            return Err(ApplyError::Blob(codec::BlobError {
                code: ErrorCode::VersionMismatch,
                id: 0,
            }));
        }

        // validation pass: nothing is applied on any failure
        let mut count = 0usize;
        for entry in BlobReader::new(blob).map_err(ApplyError::Blob)? {
            let entry = entry.map_err(ApplyError::Blob)?;
            validate::validate(&entry.header, &entry.config, &entry.name, &self.limits)
                .map_err(|e| ApplyError::Validate(entry.header.id, e))?;
            count += 1;
        }
        if self.registry.stats().total as usize - self.configured_count() + count > MAX_CHANNELS {
            return Err(ApplyError::Blob(codec::BlobError {
                code: ErrorCode::BufferTooSmall,
                id: 0,
            }));
        }

        // apply pass
        if !header.flags.contains(BlobFlags::PARTIAL) {
            self.registry.clear_configured();
        }
        for entry in reader {
            // already validated above
            let Ok(entry) = entry else { break };
            self.apply_entry(&entry);
        }
        Ok(())
    }

    fn configured_count(&self) -> usize {
        self.registry
            .iter()
            .filter(|s| !s.channel.flags.contains(ChannelFlags::BUILTIN))
            .count()
    }

    /// Install one validated entry, replacing any existing channel
    /// with the same id.
    fn apply_entry(&mut self, entry: &ChannelEntry) {
        let initial = match &entry.config {
            ChannelConfig::Number(c) => c.value,
            _ => entry.header.default_value,
        };

        if let Some(slot) = self.registry.get_mut(entry.header.id) {
            slot.channel.kind = entry.header.kind;
            slot.channel.flags = entry.header.flags;
            slot.channel.hw_device = entry.header.hw_device;
            slot.channel.hw_index = entry.header.hw_index;
            slot.channel.source_id = entry.header.source_id;
            slot.channel.default_value = entry.header.default_value;
            slot.channel.name = entry.name;
            slot.channel.value = initial;
            slot.channel.prev_value = initial;
            slot.config = entry.config;
            slot.workspace = Workspace::for_config(&entry.config);
            return;
        }

        let mut ch = Channel::new(entry.header.id, entry.header.kind);
        ch.flags = entry.header.flags;
        ch.hw_device = entry.header.hw_device;
        ch.hw_index = entry.header.hw_index;
        ch.source_id = entry.header.source_id;
        ch.default_value = entry.header.default_value;
        ch.name = entry.name;
        ch.value = initial;
        ch.prev_value = initial;
        let _ = self.registry.register(ch, entry.config);
    }

    /// Serialize the active configuration as a blob into `out`.
    fn export_blob(&self, out: &mut [u8]) -> Result<usize, ErrorCode> {
        if out.len() < BLOB_HEADER_SIZE {
            return Err(ErrorCode::BufferTooSmall);
        }
        let (head, body) = out.split_at_mut(BLOB_HEADER_SIZE);

        let mut count = 0u16;
        let mut ser = SerializerSlice::new(body);
        for slot in self.registry.iter() {
            if slot.channel.flags.contains(ChannelFlags::BUILTIN) {
                continue;
            }
            let entry = ChannelEntry {
                header: codec::EntryHeader {
                    id: slot.channel.id,
                    kind: slot.channel.kind,
                    // the fault bit is runtime state
                    flags: slot.channel.flags & !ChannelFlags::FAULT,
                    hw_device: slot.channel.hw_device,
                    hw_index: slot.channel.hw_index,
                    source_id: slot.channel.source_id,
                    default_value: slot.channel.default_value,
                },
                name: slot.channel.name,
                config: slot.config,
            };
            entry
                .serialize(&mut ser)
                .map_err(|_| ErrorCode::BufferTooSmall)?;
            count += 1;
        }
        let body_len = ser.len();

        let header = codec::BlobHeader {
            magic: codec::CONFIG_MAGIC,
            version: codec::CONFIG_VERSION,
            device_type: crate::DEVICE_TYPE,
            total_size: (BLOB_HEADER_SIZE + body_len) as u32,
            crc32: codec::BLOB_CRC.checksum(&body[..body_len]),
            channel_count: count,
            flags: BlobFlags::empty(),
            timestamp: 0,
            _reserved: Default::default(),
        };
        let mut ser = SerializerSlice::new(head);
        header
            .serialize(&mut ser)
            .map_err(|_| ErrorCode::BufferTooSmall)?;

        Ok(BLOB_HEADER_SIZE + body_len)
    }

    /// Persist the active configuration through the flash collaborator.
    fn save_config<F: Flash>(&mut self, flash: &mut F) -> Result<(), ErrorCode> {
        let mut blob = [0u8; CONFIG_MAX];
        let len = self.export_blob(&mut blob)?;

        let mut header = [0u8; hardware::FLASH_IMAGE_HEADER];
        header[0..4].copy_from_slice(&hardware::FLASH_IMAGE_MAGIC.to_le_bytes());
        header[4..6].copy_from_slice(&(len as u16).to_le_bytes());
        header[6..8]
            .copy_from_slice(&crate::protocol::FRAME_CRC.checksum(&blob[..len]).to_le_bytes());

        if flash.capacity() < hardware::FLASH_IMAGE_HEADER + len {
            return Err(ErrorCode::BufferTooSmall);
        }
        flash.erase().map_err(|_| ErrorCode::Busy)?;
        flash.write(0, &header).map_err(|_| ErrorCode::Busy)?;
        flash
            .write(hardware::FLASH_IMAGE_HEADER as u32, &blob[..len])
            .map_err(|_| ErrorCode::Busy)?;
        Ok(())
    }

    fn handle_read_config(&mut self, cmd: u8) {
        if self.upload.active {
            self.nack_code(cmd, ErrorCode::Busy);
            return;
        }

        // stage into the upload buffer; chunks stream out as the
        // queue drains
        let mut blob = [0u8; CONFIG_MAX];
        match self.export_blob(&mut blob) {
            Ok(len) => {
                self.upload.buf[..len].copy_from_slice(&blob[..len]);
                self.read.active = true;
                self.read.offset = 0;
                self.read.len = len;
                self.pump_read();
            }
            Err(code) => self.nack_code(cmd, code),
        }
    }

    fn pump_read(&mut self) {
        while self.read.active && self.out.room() > READ_CHUNK + 16 {
            let total = (self.read.len + READ_CHUNK - 1) / READ_CHUNK;
            let seq = (self.read.offset / READ_CHUNK) as u16;
            let end = (self.read.offset + READ_CHUNK).min(self.read.len);

            let mut data = [0u8; READ_CHUNK];
            let n = end - self.read.offset;
            data[..n].copy_from_slice(&self.upload.buf[self.read.offset..end]);

            self.queue(&cfgmsg::ConfigData {
                seq,
                total: total as u16,
                data: &data[..n],
            });

            self.read.offset = end;
            if self.read.offset >= self.read.len {
                self.read.active = false;
            }
        }
    }

    fn handle_set_channel<F: Flash>(&mut self, entry_bytes: &[u8], flash: &mut F) {
        let entry = match ChannelEntry::parse(entry_bytes) {
            Ok((entry, rest)) if rest.is_empty() => entry,
            Ok(_) => {
                self.set_channel_reply(0, ErrorCode::InvalidLength, "trailing bytes");
                return;
            }
            Err(code) => {
                let mut text = FmtBuf::new();
                let _ = write!(text, "{}", code);
                let id = if entry_bytes.len() >= 2 {
                    u16::from_le_bytes([entry_bytes[0], entry_bytes[1]])
                } else {
                    0
                };
                self.queue(&cfgmsg::SetChannelConfigReply {
                    id,
                    ok: 0,
                    code,
                    message: text.as_bytes(),
                });
                return;
            }
        };

        if let Err(err) =
            validate::validate(&entry.header, &entry.config, &entry.name, &self.limits)
        {
            let mut text = FmtBuf::new();
            let _ = write!(text, "{}", err);
            self.queue(&cfgmsg::SetChannelConfigReply {
                id: entry.header.id,
                ok: 0,
                code: err.code,
                message: text.as_bytes(),
            });
            return;
        }

        self.apply_entry(&entry);
        let _ = self.save_config(flash);
        self.set_channel_reply(entry.header.id, ErrorCode::None, "");
    }

    fn set_channel_reply(&mut self, id: u16, code: ErrorCode, message: &str) {
        self.queue(&cfgmsg::SetChannelConfigReply {
            id,
            ok: (code == ErrorCode::None) as u8,
            code,
            message: message.as_bytes(),
        });
    }

    fn handle_force(&mut self, cmd: u8, msg: runtime::ForceChannel) {
        let Some(slot) = self.registry.get_mut(msg.id) else {
            self.error(ErrorCode::InvalidChannelId, cmd);
            return;
        };

        if slot.channel.flags.contains(ChannelFlags::READ_ONLY) {
            self.nack_code(cmd, ErrorCode::InvalidChannelId);
            return;
        }

        match &mut slot.config {
            ChannelConfig::Number(c) => {
                if c.read_only != 0 {
                    self.nack_code(cmd, ErrorCode::InvalidChannelId);
                    return;
                }
                let value = msg.value.clamp(c.min, c.max);
                let persist = c.persist != 0;
                c.value = value;
                slot.channel.set_value(value);
                if persist {
                    self.config_dirty = true;
                }
            }
            _ => {
                slot.channel.set_value(msg.value);
            }
        }
        self.ack(cmd);
    }

    fn build_telemetry<H: Hardware>(&mut self, hw: &mut H, now_ms: u32) -> TelemetryPacket {
        self.telem.counter = self.telem.counter.wrapping_add(1);
        let flags = self.telem.flags;

        let header = TelemetryHeader {
            counter: self.telem.counter,
            timestamp_ms: now_ms,
            input_mv: self.registry.get_value(SYS_BATTERY_MV).clamp(0, u16::MAX as i32) as u16,
            mcu_temp: self.registry.get_value(SYS_MCU_TEMP) as i16,
            board_temp: self.registry.get_value(SYS_BOARD_TEMP1) as i16,
            total_current_ma: self.registry.get_value(SYS_TOTAL_CURRENT_MA).max(0) as u32,
        };

        let adc = flags.contains(TelemetryFlags::ADC).then(|| {
            let mut adc = [0u16; channel::NUM_ANALOG_INPUTS];
            for (i, v) in adc.iter_mut().enumerate() {
                *v = hw
                    .read_input(HwDevice::AnalogIn, i as u8)
                    .clamp(0, u16::MAX as i32) as u16;
            }
            adc
        });

        let mut outputs = [0u8; channel::NUM_POWER_OUTPUTS];
        let mut hb = [HBridgeStatus::default(); channel::NUM_HBRIDGES];
        let mut virtuals = Virtuals::new();
        let mut any_fault = 0u8;
        for slot in self.registry.iter() {
            let ch = &slot.channel;
            if ch.flags.contains(ChannelFlags::FAULT) {
                any_fault |= 1;
            }
            match ch.kind {
                ChannelKind::PowerOut | ChannelKind::PwmOut => {
                    let i = ch.hw_index as usize;
                    if i < outputs.len() {
                        outputs[i] = (ch.value != 0) as u8;
                    }
                }
                ChannelKind::HBridge => {
                    let i = ch.hw_index as usize;
                    if i < hb.len() {
                        hb[i].position = ch.value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                        hb[i].current_ma = hw
                            .read_input(HwDevice::HBridge, ch.hw_index)
                            .clamp(0, u16::MAX as i32)
                            as u16;
                    }
                }
                _ if ch.kind.is_computed() => {
                    if flags.contains(TelemetryFlags::VIRTUALS) {
                        virtuals.push(ch.id, ch.value);
                    }
                }
                _ => {}
            }
        }

        let din = flags.contains(TelemetryFlags::DIN).then(|| {
            let mut mask = 0u32;
            for i in 0..channel::NUM_DIGITAL_INPUTS {
                if hw.read_input(HwDevice::DigitalIn, i as u8) != 0 {
                    mask |= 1 << i;
                }
            }
            mask
        });

        let currents = flags.contains(TelemetryFlags::CURRENTS).then(|| {
            let mut currents = [0u16; channel::NUM_POWER_OUTPUTS];
            for (i, v) in currents.iter_mut().enumerate() {
                *v = hw
                    .read_input(HwDevice::PowerOut, i as u8)
                    .clamp(0, u16::MAX as i32) as u16;
            }
            currents
        });

        TelemetryPacket {
            header,
            adc,
            outputs: flags.contains(TelemetryFlags::OUTPUTS).then_some(outputs),
            hbridge: flags.contains(TelemetryFlags::HBRIDGE).then_some(hb),
            din,
            virtuals: flags.contains(TelemetryFlags::VIRTUALS).then_some(virtuals),
            faults: flags.contains(TelemetryFlags::FAULTS).then(|| Faults {
                status: self.degraded as u8,
                fault_flags: any_fault,
                _reserved: Default::default(),
            }),
            currents,
            extended: false,
        }
    }
}

/// Why a blob refused to apply.
enum ApplyError {
    Blob(codec::BlobError),
    Validate(u16, validate::ValidateError),
}

impl ApplyError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Blob(e) => e.code,
            Self::Validate(_, e) => e.code,
        }
    }
}

impl From<ApplyError> for ErrorCode {
    fn from(e: ApplyError) -> Self {
        e.code()
    }
}

/// Pump a byte transport: drain received bytes into the parser and
/// write queued frames back.
pub fn service<T, H, F>(
    device: &mut Device,
    transport: &mut T,
    hw: &mut H,
    flash: &mut F,
) -> Result<(), T::Error>
where
    T: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady,
    H: Hardware,
    F: Flash,
{
    while transport.read_ready()? {
        let mut byte = [0u8; 1];
        if transport.read(&mut byte)? == 0 {
            break;
        }
        device.push_byte(byte[0], hw, flash);
    }

    let mut frame = [0u8; MAX_FRAME_SIZE];
    while let Some(n) = device.pop_frame(&mut frame) {
        transport.write_all(&frame[..n])?;
    }
    Ok(())
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod test {
    use super::*;
    use crate::channel::CH_REF_NONE;
    use crate::config::records::*;
    use crate::hardware::MemFlash;
    use crate::protocol::serialize::{infallible, SerializerVec};
    use crate::protocol::{Command, DeviceMessage};

    use alloc::vec::Vec;

    struct TestHw {
        analog: [i32; 16],
        system: [i32; 8],
        writes: Vec<(HwDevice, u8, i32)>,
    }

    impl TestHw {
        fn new() -> Self {
            Self {
                analog: [0; 16],
                system: [0; 8],
                writes: Vec::new(),
            }
        }
    }

    impl Hardware for TestHw {
        fn read_input(&mut self, device: HwDevice, index: u8) -> i32 {
            match device {
                HwDevice::AnalogIn => self.analog[index as usize],
                HwDevice::System => self.system[index as usize],
                _ => 0,
            }
        }

        fn write_output(&mut self, device: HwDevice, index: u8, value: i32) {
            self.writes.push((device, index, value));
        }
    }

    fn device() -> (Device, TestHw, MemFlash) {
        (
            Device::new(0x1234_5678, system::FirmwareVersion::from_str_lossy("0.1.0")),
            TestHw::new(),
            MemFlash::new(CONFIG_MAX + hardware::FLASH_IMAGE_HEADER),
        )
    }

    fn send<M: MessageSerialize>(dev: &mut Device, hw: &mut TestHw, flash: &mut MemFlash, msg: &M) {
        let mut ser = SerializerVec::new();
        infallible(msg.frame(&mut ser));
        for b in ser.done() {
            dev.push_byte(b, hw, flash);
        }
    }

    fn drain(dev: &mut Device) -> Vec<DeviceMessage<Vec<u8>>> {
        let mut framer = Framer::new();
        let mut out = Vec::new();
        let mut buf = [0u8; MAX_FRAME_SIZE];
        while let Some(n) = dev.pop_frame(&mut buf) {
            for b in &buf[..n] {
                if let Some(frame) = framer.push_byte(*b) {
                    let msg = DeviceMessage::parse_frame(&frame).expect("device sent junk");
                    out.push(msg.to_owned());
                }
            }
        }
        out
    }

    fn entry(id: u16, name: &str, config: ChannelConfig) -> ChannelEntry {
        ChannelEntry {
            header: codec::EntryHeader {
                id,
                kind: config.kind(),
                flags: ChannelFlags::ENABLED,
                hw_device: 0,
                hw_index: 0,
                source_id: CH_REF_NONE,
                default_value: 0,
            },
            name: crate::ChannelName::new_from_str(name).unwrap(),
            config,
        }
    }

    fn fan_blob() -> Vec<u8> {
        let entries = [
            entry(
                10,
                "coolant",
                ChannelConfig::AnalogIn(AnalogInConfig {
                    raw_min: 0,
                    raw_max: 1000,
                    scaled_min: 0,
                    scaled_max: 1000,
                    filter_ms: 0,
                    filter_kind: FilterKind::Sma,
                    sample_count: 1,
                }),
            ),
            entry(
                300,
                "fan demand",
                ChannelConfig::Hysteresis(HysteresisConfig {
                    input_id: 10,
                    kind: HysteresisKind::Schmitt,
                    invert: 0,
                    threshold_high: 85,
                    threshold_low: 75,
                }),
            ),
        ];
        let mut buf = [0u8; 2048];
        let len = codec::build_blob(&entries, crate::DEVICE_TYPE, BlobFlags::empty(), 0, &mut buf)
            .unwrap();
        buf[..len].to_vec()
    }

    fn upload(dev: &mut Device, hw: &mut TestHw, flash: &mut MemFlash, blob: &[u8]) {
        for (seq, chunk) in blob.chunks(128).enumerate() {
            send(
                dev,
                hw,
                flash,
                &cfgmsg::ConfigChunk {
                    seq: seq as u16,
                    data: chunk,
                },
            );
        }
    }

    #[test]
    fn ping_pong() {
        let (mut dev, mut hw, mut flash) = device();
        send(&mut dev, &mut hw, &mut flash, &system::Ping);
        assert_eq!(drain(&mut dev), alloc::vec![DeviceMessage::Pong(system::Pong)]);
    }

    #[test]
    fn version_and_serial() {
        let (mut dev, mut hw, mut flash) = device();
        send(&mut dev, &mut hw, &mut flash, &system::GetVersion);
        send(&mut dev, &mut hw, &mut flash, &system::GetSerial);

        let replies = drain(&mut dev);
        assert_eq!(replies.len(), 2);
        match &replies[0] {
            DeviceMessage::Version(v) => assert_eq!(v.version.as_str(), Ok("0.1.0")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            replies[1],
            DeviceMessage::Serial(system::Serial {
                serial: 0x1234_5678
            })
        );
    }

    #[test]
    fn unknown_command_errors() {
        let (mut dev, mut hw, mut flash) = device();

        let mut ser = SerializerVec::new();
        infallible(crate::protocol::framer::write_frame(&mut ser, 0x7f, &[]));
        for b in ser.done() {
            dev.push_byte(b, &mut hw, &mut flash);
        }

        assert_eq!(
            drain(&mut dev),
            alloc::vec![DeviceMessage::ErrorReply(system::ErrorReply {
                code: ErrorCode::UnknownCommand,
                cmd: 0x7f,
            })]
        );
    }

    #[test]
    fn boot_degraded_on_blank_flash() {
        let (mut dev, _hw, mut flash) = device();
        dev.boot(&mut flash, 0);
        assert!(dev.is_degraded());
        assert_eq!(
            drain(&mut dev),
            alloc::vec![DeviceMessage::BootComplete(system::BootComplete {
                flags: system::BOOT_FLAG_DEGRADED,
            })]
        );
        // defaults-only still has the system channels
        assert_eq!(dev.registry().get_value(channel::SYS_CONST_ONE), 1);
    }

    #[test]
    fn upload_applies_and_persists() {
        let (mut dev, mut hw, mut flash) = device();
        dev.boot(&mut flash, 0);
        let _ = drain(&mut dev);

        let blob = fan_blob();
        upload(&mut dev, &mut hw, &mut flash, &blob);

        let replies = drain(&mut dev);
        let acks: Vec<_> = replies
            .iter()
            .filter(|m| matches!(m, DeviceMessage::ConfigChunkAck(a) if a.code == ErrorCode::None))
            .collect();
        assert_eq!(acks.len(), blob.chunks(128).count());
        assert!(replies
            .iter()
            .any(|m| matches!(m, DeviceMessage::Ack(a) if a.cmd == Command::ConfigChunk as u8)));

        assert_eq!(dev.registry().find_by_name("fan demand"), Some(300));

        // a fresh device finds the saved configuration on boot
        let mut dev2 = Device::new(1, system::FirmwareVersion::from_str_lossy("0.1.0"));
        dev2.boot(&mut flash, 0);
        assert!(!dev2.is_degraded());
        assert_eq!(dev2.registry().find_by_name("coolant"), Some(10));
    }

    #[test]
    fn invalid_blob_nacked_and_prior_config_kept() {
        let (mut dev, mut hw, mut flash) = device();
        upload(&mut dev, &mut hw, &mut flash, &fan_blob());
        let _ = drain(&mut dev);

        // inverted thresholds fail validation
        let bad = [entry(
            301,
            "broken",
            ChannelConfig::Hysteresis(HysteresisConfig {
                input_id: 10,
                kind: HysteresisKind::Schmitt,
                invert: 0,
                threshold_high: 70,
                threshold_low: 85,
            }),
        )];
        let mut buf = [0u8; 512];
        let len =
            codec::build_blob(&bad, crate::DEVICE_TYPE, BlobFlags::empty(), 0, &mut buf).unwrap();
        upload(&mut dev, &mut hw, &mut flash, &buf[..len]);

        let replies = drain(&mut dev);
        let nack = replies
            .iter()
            .find_map(|m| match m {
                DeviceMessage::Nack(n) => Some(n.clone()),
                _ => None,
            })
            .expect("expected a nack");
        let reason = core::str::from_utf8(&nack.reason).unwrap();
        assert!(reason.contains("threshold_high"), "reason: {}", reason);
        assert!(reason.contains("channel 301"), "reason: {}", reason);

        // the previous configuration survived
        assert_eq!(dev.registry().find_by_name("fan demand"), Some(300));
        assert_eq!(dev.registry().find_by_name("broken"), None);
    }

    #[test]
    fn force_and_read_values() {
        let (mut dev, mut hw, mut flash) = device();

        let number = [entry(
            400,
            "target rpm",
            ChannelConfig::Number(NumberConfig {
                value: 800,
                min: 0,
                max: 8000,
                step: 50,
                read_only: 0,
                persist: 0,
                _pad: Default::default(),
            }),
        )];
        let mut buf = [0u8; 512];
        let len =
            codec::build_blob(&number, crate::DEVICE_TYPE, BlobFlags::empty(), 0, &mut buf)
                .unwrap();
        upload(&mut dev, &mut hw, &mut flash, &buf[..len]);
        let _ = drain(&mut dev);

        send(
            &mut dev,
            &mut hw,
            &mut flash,
            &runtime::GetChannelValue { id: 400 },
        );
        assert_eq!(
            drain(&mut dev),
            alloc::vec![DeviceMessage::ChannelValue(runtime::ChannelValue {
                id: 400,
                value: 800,
            })]
        );

        // forcing clamps into the number's own bounds
        send(
            &mut dev,
            &mut hw,
            &mut flash,
            &runtime::ForceChannel {
                id: 400,
                value: 99_999,
            },
        );
        let _ = drain(&mut dev);
        assert_eq!(dev.registry().get_value(400), 8000);

        // unknown ids answer with an error frame
        send(
            &mut dev,
            &mut hw,
            &mut flash,
            &runtime::ForceChannel { id: 999, value: 1 },
        );
        assert_eq!(
            drain(&mut dev),
            alloc::vec![DeviceMessage::ErrorReply(system::ErrorReply {
                code: ErrorCode::InvalidChannelId,
                cmd: Command::ForceChannel as u8,
            })]
        );
    }

    #[test]
    fn partial_blob_overlays() {
        let (mut dev, mut hw, mut flash) = device();
        upload(&mut dev, &mut hw, &mut flash, &fan_blob());
        let _ = drain(&mut dev);

        // a partial blob adds one channel without clearing the rest
        let extra = [entry(
            310,
            "fan latch",
            ChannelConfig::FlipFlop(FlipFlopConfig {
                kind: FlipFlopKind::Sr,
                set_id: 300,
                ..Default::default()
            }),
        )];
        let mut buf = [0u8; 512];
        let len =
            codec::build_blob(&extra, crate::DEVICE_TYPE, BlobFlags::PARTIAL, 0, &mut buf)
                .unwrap();
        upload(&mut dev, &mut hw, &mut flash, &buf[..len]);
        let _ = drain(&mut dev);

        assert_eq!(dev.registry().find_by_name("fan demand"), Some(300));
        assert_eq!(dev.registry().find_by_name("fan latch"), Some(310));

        // a full blob replaces everything
        upload(&mut dev, &mut hw, &mut flash, &fan_blob());
        let _ = drain(&mut dev);
        assert_eq!(dev.registry().find_by_name("fan latch"), None);
    }

    #[test]
    fn persist_flagged_number_written_back() {
        let (mut dev, mut hw, mut flash) = device();

        let number = [entry(
            400,
            "fan setpoint",
            ChannelConfig::Number(NumberConfig {
                value: 85,
                min: 0,
                max: 120,
                step: 1,
                read_only: 0,
                persist: 1,
                _pad: Default::default(),
            }),
        )];
        let mut buf = [0u8; 512];
        let len =
            codec::build_blob(&number, crate::DEVICE_TYPE, BlobFlags::empty(), 0, &mut buf)
                .unwrap();
        upload(&mut dev, &mut hw, &mut flash, &buf[..len]);
        let _ = drain(&mut dev);

        send(
            &mut dev,
            &mut hw,
            &mut flash,
            &runtime::ForceChannel { id: 400, value: 90 },
        );
        let _ = drain(&mut dev);
        // the flash update happens on the next tick
        dev.run(&mut hw, &mut flash, 10);

        let mut dev2 = Device::new(2, system::FirmwareVersion::from_str_lossy("0.1.0"));
        dev2.boot(&mut flash, 0);
        assert!(!dev2.is_degraded());
        assert_eq!(dev2.registry().get_value(400), 90);
    }

    #[test]
    fn system_channels_are_read_only() {
        let (mut dev, mut hw, mut flash) = device();
        send(
            &mut dev,
            &mut hw,
            &mut flash,
            &runtime::ForceChannel {
                id: channel::SYS_CONST_ONE,
                value: 7,
            },
        );
        assert!(matches!(
            drain(&mut dev).as_slice(),
            [DeviceMessage::Nack(_)]
        ));
        assert_eq!(dev.registry().get_value(channel::SYS_CONST_ONE), 1);
    }

    #[test]
    fn telemetry_subscription_streams() {
        let (mut dev, mut hw, mut flash) = device();
        upload(&mut dev, &mut hw, &mut flash, &fan_blob());
        let _ = drain(&mut dev);

        send(
            &mut dev,
            &mut hw,
            &mut flash,
            &telmsg::TelemetrySubscribe {
                flags: TelemetryFlags::VIRTUALS | TelemetryFlags::DIN | TelemetryFlags::FAULTS,
                rate_ms: 50,
            },
        );
        let _ = drain(&mut dev);

        hw.system[system_index::BATTERY_MV as usize] = 13_800;
        hw.analog[0] = 90;
        dev.run(&mut hw, &mut flash, 100);
        dev.run(&mut hw, &mut flash, 160);

        let packets: Vec<_> = drain(&mut dev)
            .into_iter()
            .filter_map(|m| match m {
                DeviceMessage::TelemetryData(t) => Some(t.packet),
                _ => None,
            })
            .collect();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].header.counter + 1, packets[1].header.counter);
        assert_eq!(packets[1].header.input_mv, 13_800);
        assert!(packets[1].din.is_some());
        assert!(packets[1].faults.is_some());

        let virtuals = packets[1].virtuals.expect("virtuals section");
        assert!(virtuals
            .entries()
            .iter()
            .any(|e| e.id == 300 && e.value == 1));

        // unsubscribe stops the stream
        send(&mut dev, &mut hw, &mut flash, &telmsg::TelemetryUnsubscribe);
        let _ = drain(&mut dev);
        dev.run(&mut hw, &mut flash, 500);
        assert!(drain(&mut dev).is_empty());
    }

    #[test]
    fn read_config_streams_back() {
        let (mut dev, mut hw, mut flash) = device();
        let blob = fan_blob();
        upload(&mut dev, &mut hw, &mut flash, &blob);
        let _ = drain(&mut dev);

        send(&mut dev, &mut hw, &mut flash, &cfgmsg::ReadConfig);

        let mut data = Vec::new();
        let mut total = None;
        for msg in drain(&mut dev) {
            if let DeviceMessage::ConfigData(chunk) = msg {
                assert_eq!(chunk.seq as usize, data.len() / READ_CHUNK);
                total = Some(chunk.total);
                data.extend_from_slice(&chunk.data);
            }
        }
        assert_eq!(total, Some(((data.len() + READ_CHUNK - 1) / READ_CHUNK) as u16));

        // the streamed blob parses and holds both channels
        let reader = BlobReader::new(&data).unwrap();
        let ids: Vec<_> = reader.map(|e| e.unwrap().header.id).collect();
        assert_eq!(ids, alloc::vec![10, 300]);
    }

    #[test]
    fn set_channel_config_atomic() {
        let (mut dev, mut hw, mut flash) = device();
        upload(&mut dev, &mut hw, &mut flash, &fan_blob());
        let _ = drain(&mut dev);

        // retune the fan thresholds in place
        let e = entry(
            300,
            "fan demand",
            ChannelConfig::Hysteresis(HysteresisConfig {
                input_id: 10,
                kind: HysteresisKind::Schmitt,
                invert: 0,
                threshold_high: 95,
                threshold_low: 80,
            }),
        );
        let mut ser = SerializerVec::new();
        infallible(e.serialize(&mut ser));
        send(
            &mut dev,
            &mut hw,
            &mut flash,
            &cfgmsg::SetChannelConfig {
                entry: ser.done().as_slice(),
            },
        );

        let replies = drain(&mut dev);
        match replies.as_slice() {
            [DeviceMessage::SetChannelConfigReply(r)] => {
                assert_eq!(r.id, 300);
                assert_eq!(r.ok, 1);
                assert_eq!(r.code, ErrorCode::None);
            }
            other => panic!("unexpected {:?}", other),
        }

        match dev.registry().get(300).map(|s| &s.config) {
            Some(ChannelConfig::Hysteresis(h)) => assert_eq!(h.threshold_high, 95),
            other => panic!("unexpected {:?}", other),
        }

        // an invalid replacement reports the precise field
        let e = entry(
            300,
            "fan demand",
            ChannelConfig::Hysteresis(HysteresisConfig {
                input_id: 10,
                kind: HysteresisKind::Schmitt,
                invert: 0,
                threshold_high: 10,
                threshold_low: 80,
            }),
        );
        let mut ser = SerializerVec::new();
        infallible(e.serialize(&mut ser));
        send(
            &mut dev,
            &mut hw,
            &mut flash,
            &cfgmsg::SetChannelConfig {
                entry: ser.done().as_slice(),
            },
        );

        let replies = drain(&mut dev);
        match replies.as_slice() {
            [DeviceMessage::SetChannelConfigReply(r)] => {
                assert_eq!(r.ok, 0);
                assert_eq!(r.code, ErrorCode::InvalidBounds);
                let text = core::str::from_utf8(&r.message).unwrap();
                assert!(text.contains("threshold_high"), "message: {}", text);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    /// In-memory byte transport for the embedded-io service pump.
    struct Pipe {
        rx: alloc::collections::VecDeque<u8>,
        tx: Vec<u8>,
    }

    impl embedded_io::ErrorType for Pipe {
        type Error = core::convert::Infallible;
    }

    impl embedded_io::Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let mut n = 0;
            while n < buf.len() {
                match self.rx.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }

    impl embedded_io::ReadReady for Pipe {
        fn read_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.rx.is_empty())
        }
    }

    impl embedded_io::Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn service_pumps_transport() {
        let (mut dev, mut hw, mut flash) = device();

        let mut ser = SerializerVec::new();
        infallible(system::Ping.frame(&mut ser));
        let mut pipe = Pipe {
            rx: ser.done().into_iter().collect(),
            tx: Vec::new(),
        };

        service(&mut dev, &mut pipe, &mut hw, &mut flash).unwrap();

        let mut framer = Framer::new();
        let mut got_pong = false;
        for b in pipe.tx {
            if let Some(frame) = framer.push_byte(b) {
                got_pong = frame.cmd == system::Pong::CMD;
            }
        }
        assert!(got_pong);
    }

    #[test]
    fn restart_handshake() {
        let (mut dev, mut hw, mut flash) = device();
        send(&mut dev, &mut hw, &mut flash, &system::Restart);
        assert_eq!(
            drain(&mut dev),
            alloc::vec![DeviceMessage::RestartAck(system::RestartAck)]
        );
        assert!(dev.restart_requested());

        dev.boot(&mut flash, 1000);
        assert!(!dev.restart_requested());
        assert!(matches!(
            drain(&mut dev).as_slice(),
            [DeviceMessage::BootComplete(_)]
        ));
    }

    #[test]
    fn executor_runs_configured_graph() {
        let (mut dev, mut hw, mut flash) = device();
        upload(&mut dev, &mut hw, &mut flash, &fan_blob());
        let _ = drain(&mut dev);

        for (tick, (input, expect)) in
            [(70, 0), (80, 0), (86, 1), (80, 1), (74, 0)].iter().enumerate()
        {
            hw.analog[0] = *input;
            dev.run(&mut hw, &mut flash, (tick as u32 + 1) * 10);
            assert_eq!(dev.registry().get_value(300), *expect, "input {}", input);
        }
    }
}
