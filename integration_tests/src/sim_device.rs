//! A simulated CANopen device
//!
//! Implements just enough of a node for host-side testing: an SDO server (expedited and segmented
//! transfers) over a flat table of objects, and NMT state handling.
use std::collections::BTreeMap;

use sdolink_common::{
    constants::object_ids::{DEVICE_TYPE, HEARTBEAT_PRODUCER_TIME},
    messages::{
        Heartbeat, NmtCommand, NmtCommandCmd, NmtState, NMT_CMD_ID, SDO_REQ_BASE, SDO_RESP_BASE,
    },
    objects::AccessType,
    sdo::{AbortCode, SdoRequest, SdoResponse},
    CanId, CanMessage,
};

#[derive(Debug, Clone)]
struct SimObject {
    data: Vec<u8>,
    access: AccessType,
}

#[derive(Debug, Clone)]
enum Transfer {
    Download {
        index: u16,
        sub: u8,
        buf: Vec<u8>,
        toggle: bool,
    },
    Upload {
        data: Vec<u8>,
        pos: usize,
        toggle: bool,
    },
}

/// A simulated device on a [`SimBus`](crate::sim_bus::SimBus)
#[derive(Debug, Clone)]
pub struct SimDevice {
    node: u8,
    state: NmtState,
    objects: BTreeMap<(u16, u8), SimObject>,
    transfer: Option<Transfer>,
    silent: bool,
    flip_toggle: bool,
    nmt_history: Vec<NmtCommandCmd>,
}

impl SimDevice {
    /// Create a device with the given node ID, exposing only the device type object
    pub fn new(node: u8) -> Self {
        let mut objects = BTreeMap::new();
        objects.insert(
            (DEVICE_TYPE, 0),
            SimObject {
                data: 0x0001_0191u32.to_le_bytes().to_vec(),
                access: AccessType::Ro,
            },
        );
        Self {
            node,
            state: NmtState::PreOperational,
            objects,
            transfer: None,
            silent: false,
            flip_toggle: false,
            nmt_history: Vec::new(),
        }
    }

    /// Add an object; its size is fixed by the initial value
    pub fn with_object(mut self, index: u16, sub: u8, access: AccessType, value: &[u8]) -> Self {
        self.objects.insert(
            (index, sub),
            SimObject {
                data: value.to_vec(),
                access,
            },
        );
        self
    }

    /// Add a 16-bit heartbeat producer time object
    pub fn with_heartbeat(self) -> Self {
        self.with_object(HEARTBEAT_PRODUCER_TIME, 0, AccessType::Rw, &[0, 0])
    }

    /// Make the SDO server ignore all requests
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Make the SDO server answer segments with the wrong toggle bit
    pub fn with_broken_toggle(mut self) -> Self {
        self.flip_toggle = true;
        self
    }

    /// The device's node ID
    pub fn node(&self) -> u8 {
        self.node
    }

    /// The device's NMT state
    pub fn state(&self) -> NmtState {
        self.state
    }

    /// Every NMT command the device has acted on
    pub fn nmt_history(&self) -> &[NmtCommandCmd] {
        &self.nmt_history
    }

    /// The current value of an object
    pub fn value(&self, index: u16, sub: u8) -> Option<&[u8]> {
        self.objects.get(&(index, sub)).map(|o| o.data.as_slice())
    }

    /// Handle a frame from the bus, returning the frames the device sends in response
    pub fn handle(&mut self, msg: CanMessage) -> Vec<CanMessage> {
        if msg.id() == NMT_CMD_ID {
            return self.handle_nmt(msg);
        }
        if msg.id() == CanId::std(SDO_REQ_BASE + self.node as u16) && !self.silent {
            let resp = match SdoRequest::try_from(msg.data()) {
                Ok(req) => self.handle_sdo(req),
                Err(abort_code) => Some(SdoResponse::abort(0, 0, abort_code)),
            };
            return resp
                .map(|r| vec![r.to_can_message(CanId::std(SDO_RESP_BASE + self.node as u16))])
                .unwrap_or_default();
        }
        Vec::new()
    }

    fn handle_nmt(&mut self, msg: CanMessage) -> Vec<CanMessage> {
        let Ok(cmd) = NmtCommand::try_from(msg) else {
            return Vec::new();
        };
        if cmd.node != 0 && cmd.node != self.node {
            return Vec::new();
        }
        self.nmt_history.push(cmd.cmd);
        match cmd.cmd {
            NmtCommandCmd::Start => self.state = NmtState::Operational,
            NmtCommandCmd::Stop => self.state = NmtState::Stopped,
            NmtCommandCmd::EnterPreOp => self.state = NmtState::PreOperational,
            NmtCommandCmd::ResetApp | NmtCommandCmd::ResetComm => {
                self.transfer = None;
                self.state = NmtState::PreOperational;
                let bootup = Heartbeat {
                    node: self.node,
                    toggle: false,
                    state: NmtState::Bootup,
                };
                return vec![bootup.into()];
            }
        }
        Vec::new()
    }

    fn handle_sdo(&mut self, req: SdoRequest) -> Option<SdoResponse> {
        match req {
            SdoRequest::InitiateUpload { index, sub } => {
                self.transfer = None;
                let obj = match self.objects.get(&(index, sub)) {
                    Some(obj) => obj,
                    None => return Some(SdoResponse::abort(index, sub, AbortCode::NoSuchObject)),
                };
                if !obj.access.is_readable() {
                    return Some(SdoResponse::abort(index, sub, AbortCode::WriteOnly));
                }
                if obj.data.len() <= 4 {
                    Some(SdoResponse::expedited_upload(index, sub, &obj.data))
                } else {
                    let data = obj.data.clone();
                    let size = data.len() as u32;
                    self.transfer = Some(Transfer::Upload {
                        data,
                        pos: 0,
                        toggle: false,
                    });
                    Some(SdoResponse::upload_acknowledge(index, sub, size))
                }
            }
            SdoRequest::ReqUploadSegment { t } => {
                let Some(Transfer::Upload { data, pos, toggle }) = self.transfer.as_mut() else {
                    return Some(SdoResponse::abort(0, 0, AbortCode::InvalidCommandSpecifier));
                };
                if t != *toggle {
                    self.transfer = None;
                    return Some(SdoResponse::abort(0, 0, AbortCode::ToggleNotAlternated));
                }
                let end = (*pos + 7).min(data.len());
                let complete = end == data.len();
                let resp_toggle = if self.flip_toggle { !t } else { t };
                let resp = SdoResponse::upload_segment(resp_toggle, complete, &data[*pos..end]);
                *pos = end;
                *toggle = !*toggle;
                if complete {
                    self.transfer = None;
                }
                Some(resp)
            }
            SdoRequest::InitiateDownload {
                n,
                e,
                s,
                index,
                sub,
                data,
            } => {
                self.transfer = None;
                let obj = match self.objects.get(&(index, sub)) {
                    Some(obj) => obj,
                    None => return Some(SdoResponse::abort(index, sub, AbortCode::NoSuchObject)),
                };
                if !obj.access.is_writable() {
                    return Some(SdoResponse::abort(index, sub, AbortCode::ReadOnly));
                }
                if e {
                    let len = if s { 4 - n as usize } else { 4 };
                    if let Err(code) = self.store(index, sub, &data[..len]) {
                        return Some(SdoResponse::abort(index, sub, code));
                    }
                } else {
                    self.transfer = Some(Transfer::Download {
                        index,
                        sub,
                        buf: Vec::new(),
                        toggle: false,
                    });
                }
                Some(SdoResponse::download_acknowledge(index, sub))
            }
            SdoRequest::DownloadSegment { t, n, c, data } => {
                let Some(Transfer::Download {
                    index,
                    sub,
                    buf,
                    toggle,
                }) = self.transfer.as_mut()
                else {
                    return Some(SdoResponse::abort(0, 0, AbortCode::InvalidCommandSpecifier));
                };
                let (index, sub) = (*index, *sub);
                if t != *toggle {
                    self.transfer = None;
                    return Some(SdoResponse::abort(index, sub, AbortCode::ToggleNotAlternated));
                }
                buf.extend_from_slice(&data[..7 - n as usize]);
                *toggle = !*toggle;
                let resp_toggle = if self.flip_toggle { !t } else { t };
                if c {
                    let buf = std::mem::take(buf);
                    self.transfer = None;
                    if let Err(code) = self.store(index, sub, &buf) {
                        return Some(SdoResponse::abort(index, sub, code));
                    }
                }
                Some(SdoResponse::download_segment_acknowledge(resp_toggle))
            }
            SdoRequest::Abort { .. } => {
                self.transfer = None;
                None
            }
        }
    }

    fn store(&mut self, index: u16, sub: u8, value: &[u8]) -> Result<(), AbortCode> {
        let obj = self
            .objects
            .get_mut(&(index, sub))
            .ok_or(AbortCode::NoSuchObject)?;
        if value.len() > obj.data.len() {
            return Err(AbortCode::DataTypeMismatchLengthHigh);
        }
        if value.len() < obj.data.len() {
            return Err(AbortCode::DataTypeMismatchLengthLow);
        }
        obj.data.copy_from_slice(value);
        Ok(())
    }
}
