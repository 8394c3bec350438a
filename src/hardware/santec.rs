//! Safe driver for the Santec SLM-200 over the vendor `SLMFunc` library.
//!
//! [`SantecSlm`] owns one display output and one USB control channel. Every
//! vendor call goes through [`check_status`], which turns a non-OK status into
//! [`SlmError::Device`] with the description from the fixed status table.
//!
//! Both handles are closed when the driver is dropped.

#![allow(unsafe_code)]

use std::fmt;

use parking_lot::Mutex;
use santec_sys as sys;
use tracing::{debug, info, warn};

use crate::error::{SlmError, SlmResult};
use crate::hardware::capabilities::{DisplayFlags, Dimensions, SlmDevice, WavelengthPhase};

/// Human-readable description of a vendor status code.
pub fn status_description(code: i32) -> &'static str {
    match code {
        sys::SLM_OK => "OK",
        sys::SLM_NG => "NG",
        sys::SLM_BS => "SLM is busy",
        sys::SLM_ER => "parameter error",
        sys::SLM_INVAID_MONITOR => "display no not found",
        sys::SLM_NOT_OPEN_MONITOR => "display not opened",
        sys::SLM_OPEN_WINDOW_ERR => "window open error",
        sys::SLM_DATA_FORMAT_ERR => "data format error",
        sys::SLM_FILE_READ_ERR => "file read error (over 1023?)",
        sys::SLM_NOT_OPEN_USB => "USB not opened",
        sys::SLM_OTHER_ERROR => "other error",
        sys::FT_INVALID_HANDLE => "USB driver error (invalid handle)",
        sys::FT_DEVICE_NOT_FOUND => {
            "device not found (check power/connection; if connected, reset power)"
        }
        sys::FT_DEVICE_NOT_OPENED => "device already opened",
        sys::FT_IO_ERROR => "USB driver error (I/O error)",
        sys::FT_INSUFFICIENT_RESOURCES => "USB driver error (insufficient resources)",
        sys::FT_INVALID_PARAMETER => "USB driver error (invalid parameter)",
        sys::FT_INVALID_BAUD_RATE => "USB driver error (invalid baud rate)",
        sys::FT_DEVICE_NOT_OPENED_FOR_ERASE => "USB driver error (not opened for erase)",
        sys::FT_DEVICE_NOT_OPENED_FOR_WRITE => "USB driver error (not opened for write)",
        sys::FT_FAILED_TO_WRITE_DEVICE => "USB driver error (failed to write device)",
        sys::FT_EEPROM_READ_FAILED => "USB driver error (EEPROM read failed)",
        sys::FT_EEPROM_WRITE_FAILED => "USB driver error (EEPROM write failed)",
        sys::FT_EEPROM_ERASE_FAILED => "USB driver error (EEPROM erase failed)",
        sys::FT_EEPROM_NOT_PRESENT => "USB driver error (EEPROM not present)",
        sys::FT_EEPROM_NOT_PROGRAMMED => "USB driver error (EEPROM not programmed)",
        sys::FT_INVALID_ARGS => "USB driver error (invalid args)",
        sys::FT_NOT_SUPPORTED => "USB driver error (not supported)",
        sys::FT_NO_MORE_ITEMS => "USB driver error (no more items)",
        sys::FT_TIMEOUT => "USB driver error (timeout)",
        sys::FT_OPERATION_ABORTED => "USB driver error (operation aborted)",
        sys::FT_RESERVED_PIPE => "USB driver error (reserved pipe)",
        sys::FT_INVALID_CONTROL_REQUEST_DIRECTION => {
            "USB driver error (invalid control request direction)"
        }
        sys::FT_INVALID_CONTROL_REQUEST_TYPE => "USB driver error (invalid control request type)",
        sys::FT_IO_PENDING => "USB driver error (I/O pending)",
        sys::FT_IO_INCOMPLETE => "USB driver error (I/O incomplete)",
        sys::FT_HANDLE_EOF => "USB driver error (handle EOF)",
        sys::FT_BUSY => "USB driver error (busy)",
        sys::FT_NO_SYSTEM_RESOURCES => "USB driver error (no system resources)",
        sys::FT_DEVICE_LIST_NOT_READY => "USB driver error (device list not ready)",
        sys::FT_DEVICE_NOT_CONNECTED => "USB driver error (device not connected)",
        sys::FT_INCORRECT_DEVICE_PATH => "USB driver error (incorrect device path)",
        sys::FT_OTHER_ERROR => "USB driver error (other error)",
        _ => "unknown status code",
    }
}

/// Map a vendor status to `Ok(())` or a [`SlmError::Device`].
pub fn check_status(code: i32, context: &str) -> SlmResult<()> {
    if code == sys::SLM_OK {
        return Ok(());
    }
    Err(SlmError::Device {
        code,
        description: status_description(code),
        context: context.to_string(),
    })
}

/// Source of the displayed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    /// Patterns stored in controller memory.
    Memory,
    /// Live DVI input from the host.
    Dvi,
}

impl VideoMode {
    fn to_raw(self) -> u32 {
        match self {
            VideoMode::Memory => sys::VIDEO_MODE_MEMORY,
            VideoMode::Dvi => sys::VIDEO_MODE_DVI,
        }
    }

    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            sys::VIDEO_MODE_MEMORY => Some(VideoMode::Memory),
            sys::VIDEO_MODE_DVI => Some(VideoMode::Dvi),
            _ => None,
        }
    }
}

/// Controller readiness as reported by `SLM_Ctrl_ReadSU`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    /// Accepts commands.
    Ready,
    /// Still processing the previous command.
    Busy,
}

impl ControllerStatus {
    /// Interpret the status returned by the readiness query.
    fn from_status(code: i32) -> SlmResult<Self> {
        match code {
            sys::SLM_OK => Ok(ControllerStatus::Ready),
            sys::SLM_BS => Ok(ControllerStatus::Busy),
            other => check_status(other, "read controller status").map(|()| ControllerStatus::Ready),
        }
    }
}

#[derive(Debug, Default)]
struct Handles {
    display_open: bool,
    usb_open: bool,
}

/// Santec SLM addressed by display number and SLM (USB) number.
pub struct SantecSlm {
    display_number: u32,
    slm_number: u32,
    /// Serializes vendor calls; the library is not documented as thread-safe.
    handles: Mutex<Handles>,
}

impl fmt::Debug for SantecSlm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SantecSlm")
            .field("display_number", &self.display_number)
            .field("slm_number", &self.slm_number)
            .finish()
    }
}

impl SantecSlm {
    /// Driver for display `display_number` and USB controller `slm_number`.
    /// Nothing is opened until [`SlmDevice::open`].
    pub fn new(display_number: u32, slm_number: u32) -> Self {
        Self {
            display_number,
            slm_number,
            handles: Mutex::new(Handles::default()),
        }
    }

    /// Monitor number of the display output.
    pub fn display_number(&self) -> u32 {
        self.display_number
    }

    /// USB controller number.
    pub fn slm_number(&self) -> u32 {
        self.slm_number
    }

    /// Current image source.
    pub fn read_video_mode(&self) -> SlmResult<VideoMode> {
        let _guard = self.handles.lock();
        let mut raw: u32 = 0;
        // SAFETY: `raw` outlives the call and is a valid out-pointer
        let status = unsafe { sys::SLM_Ctrl_ReadVI(self.slm_number, &mut raw) };
        check_status(status, "read video mode")?;
        VideoMode::from_raw(raw).ok_or_else(|| SlmError::Device {
            code: sys::SLM_OTHER_ERROR,
            description: status_description(sys::SLM_OTHER_ERROR),
            context: format!("read video mode: unexpected mode {raw}"),
        })
    }

    /// Switch the image source. Patterns written by this crate need [`VideoMode::Dvi`].
    pub fn write_video_mode(&self, mode: VideoMode) -> SlmResult<()> {
        let _guard = self.handles.lock();
        // SAFETY: plain value arguments
        let status = unsafe { sys::SLM_Ctrl_WriteVI(self.slm_number, mode.to_raw()) };
        check_status(status, "write video mode")?;
        info!(?mode, "video mode set");
        Ok(())
    }

    /// Whether the controller accepts commands.
    pub fn read_status(&self) -> SlmResult<ControllerStatus> {
        let _guard = self.handles.lock();
        // SAFETY: plain value argument
        let status = unsafe { sys::SLM_Ctrl_ReadSU(self.slm_number) };
        ControllerStatus::from_status(status)
    }
}

impl SlmDevice for SantecSlm {
    fn open(&self) -> SlmResult<()> {
        let mut handles = self.handles.lock();
        // SAFETY: plain value argument
        let status = unsafe { sys::SLM_Disp_Open(self.display_number) };
        check_status(status, &format!("open display {}", self.display_number))?;
        handles.display_open = true;

        // SAFETY: plain value argument
        let status = unsafe { sys::SLM_Ctrl_Open(self.slm_number) };
        if let Err(err) = check_status(status, &format!("open SLM {} over USB", self.slm_number)) {
            // SAFETY: the display was opened above
            let _ = unsafe { sys::SLM_Disp_Close(self.display_number) };
            handles.display_open = false;
            return Err(err);
        }
        handles.usb_open = true;

        info!(
            display = self.display_number,
            slm = self.slm_number,
            "Opened Santec SLM"
        );
        Ok(())
    }

    fn close(&self) -> SlmResult<()> {
        let mut handles = self.handles.lock();
        // SAFETY: plain value arguments
        let display = unsafe { sys::SLM_Disp_Close(self.display_number) };
        let usb = unsafe { sys::SLM_Ctrl_Close(self.slm_number) };
        handles.display_open = false;
        handles.usb_open = false;
        check_status(display, "close display")?;
        check_status(usb, "close USB")?;
        info!(display = self.display_number, slm = self.slm_number, "Closed Santec SLM");
        Ok(())
    }

    fn write_grayscale(&self, value: u16) -> SlmResult<()> {
        let _guard = self.handles.lock();
        // SAFETY: plain value arguments
        let status = unsafe {
            sys::SLM_Disp_GrayScale(self.display_number, DisplayFlags::NOP.bits(), value)
        };
        check_status(status, "write grayscale")
    }

    fn write_pattern(
        &self,
        width: usize,
        height: usize,
        flags: DisplayFlags,
        data: &[u16],
    ) -> SlmResult<()> {
        if data.len() != width * height {
            return Err(SlmError::Precondition(format!(
                "pattern buffer has {} values, display is {width}x{height}",
                data.len()
            )));
        }
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(SlmError::Precondition(format!(
                "pattern size {width}x{height} exceeds the display interface"
            )));
        };
        let _guard = self.handles.lock();
        // SAFETY: `data` holds exactly w*h values and outlives the call
        let status =
            unsafe { sys::SLM_Disp_Data(self.display_number, w, h, flags.bits(), data.as_ptr()) };
        check_status(status, "write pattern")?;
        debug!(width, height, "pattern written");
        Ok(())
    }

    fn read_dimensions(&self) -> SlmResult<Dimensions> {
        let _guard = self.handles.lock();
        let mut width: u16 = 0;
        let mut height: u16 = 0;
        // SAFETY: both out-pointers are valid for the duration of the call
        let status = unsafe { sys::SLM_Disp_Info(self.display_number, &mut width, &mut height) };
        check_status(status, "read display info")?;
        Ok(Dimensions {
            height: usize::from(height),
            width: usize::from(width),
        })
    }

    fn write_wavelength_phase(&self, setting: WavelengthPhase) -> SlmResult<()> {
        let _guard = self.handles.lock();
        // SAFETY: plain value arguments
        let status = unsafe {
            sys::SLM_Ctrl_WriteWL(self.slm_number, setting.wavelength_nm, setting.phase_x100)
        };
        check_status(status, "write wavelength/phase")
    }

    fn read_wavelength_phase(&self) -> SlmResult<WavelengthPhase> {
        let _guard = self.handles.lock();
        let mut wavelength_nm: u32 = 0;
        let mut phase_x100: u32 = 0;
        // SAFETY: both out-pointers are valid for the duration of the call
        let status =
            unsafe { sys::SLM_Ctrl_ReadWL(self.slm_number, &mut wavelength_nm, &mut phase_x100) };
        check_status(status, "read wavelength/phase")?;
        Ok(WavelengthPhase {
            wavelength_nm,
            phase_x100,
        })
    }

    fn save_wavelength_phase(&self) -> SlmResult<()> {
        let _guard = self.handles.lock();
        // SAFETY: plain value argument
        let status = unsafe { sys::SLM_Ctrl_WriteAW(self.slm_number) };
        check_status(status, "save wavelength/phase")
    }
}

impl Drop for SantecSlm {
    fn drop(&mut self) {
        let handles = self.handles.get_mut();
        if handles.display_open {
            // SAFETY: we opened this display and nothing else closes it
            let status = unsafe { sys::SLM_Disp_Close(self.display_number) };
            if status != sys::SLM_OK {
                warn!(status, display = self.display_number, "Error closing display");
            }
        }
        if handles.usb_open {
            // SAFETY: we opened this USB channel and nothing else closes it
            let status = unsafe { sys::SLM_Ctrl_Close(self.slm_number) };
            if status != sys::SLM_OK {
                warn!(status, slm = self.slm_number, "Error closing USB channel");
            }
        }
    }
}
