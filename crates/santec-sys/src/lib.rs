//! Low-level FFI bindings for the Santec SLM-200 `SLMFunc` library.
//!
//! The vendor library exposes two groups of entry points:
//!
//! - `SLM_Disp_*` drive the display output (a DVI monitor from the host's
//!   point of view), addressed by display number (1, 2, 3, ...).
//! - `SLM_Ctrl_*` talk to the controller over USB, addressed by SLM number
//!   (1-8).
//!
//! Every function returns an `SLM_STATUS` code; `SLM_OK` (0) means success.
//!
//! # Safety
//!
//! All functions in this crate are `unsafe` as they are direct FFI bindings.
//! For a safe wrapper, use `santec_slm::hardware::santec` instead.
//!
//! # Features
//!
//! - `santec-sdk`: link against the vendor import library. Without this
//!   feature, dummy functions with the same signatures are compiled in. Open
//!   calls report "display no not found" / "device not found" and every
//!   other call reports the handle as not opened, so higher layers fail the
//!   same way they would on a machine without the device attached.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(unsafe_code)]
#![allow(missing_docs)]
#![allow(clippy::all)]

use std::os::raw::c_int;

/// Unsigned 32-bit `DWORD`.
pub type DWORD = u32;
/// Unsigned 16-bit `WORD` / `USHORT`.
pub type USHORT = u16;
/// Wide character as used by `LPCWSTR` on Windows.
pub type WCHAR = u16;
/// `typedef int SLM_STATUS;`
pub type SLM_STATUS = c_int;

// Display flags
pub const FLAGS_COLOR_NOP: DWORD = 0x0000_0000;
pub const FLAGS_COLOR_R: DWORD = 0x0000_0001;
pub const FLAGS_COLOR_G: DWORD = 0x0000_0002;
pub const FLAGS_COLOR_B: DWORD = 0x0000_0004;
pub const FLAGS_COLOR_GRAY: DWORD = 0x0000_0008;
pub const FLAGS_COLOR_10BIT: DWORD = 0x0000_0100;
pub const FLAGS_RATE120: DWORD = 0x2000_0000;

// SLM_STATUS return values
pub const SLM_OK: SLM_STATUS = 0;
pub const SLM_NG: SLM_STATUS = 1;
pub const SLM_BS: SLM_STATUS = 2;
pub const SLM_ER: SLM_STATUS = 3;

pub const SLM_INVAID_MONITOR: SLM_STATUS = -1;
pub const SLM_NOT_OPEN_MONITOR: SLM_STATUS = -2;
pub const SLM_OPEN_WINDOW_ERR: SLM_STATUS = -3;
pub const SLM_DATA_FORMAT_ERR: SLM_STATUS = -4;
pub const SLM_FILE_READ_ERR: SLM_STATUS = -101;
pub const SLM_NOT_OPEN_USB: SLM_STATUS = -200;
pub const SLM_OTHER_ERROR: SLM_STATUS = -1000;

// FTDI (USB driver) errors
pub const FT_INVALID_HANDLE: SLM_STATUS = -10001;
pub const FT_DEVICE_NOT_FOUND: SLM_STATUS = -10002;
pub const FT_DEVICE_NOT_OPENED: SLM_STATUS = -10003;
pub const FT_IO_ERROR: SLM_STATUS = -10004;
pub const FT_INSUFFICIENT_RESOURCES: SLM_STATUS = -10005;
pub const FT_INVALID_PARAMETER: SLM_STATUS = -10006;
pub const FT_INVALID_BAUD_RATE: SLM_STATUS = -10007;
pub const FT_DEVICE_NOT_OPENED_FOR_ERASE: SLM_STATUS = -10008;
pub const FT_DEVICE_NOT_OPENED_FOR_WRITE: SLM_STATUS = -10009;
pub const FT_FAILED_TO_WRITE_DEVICE: SLM_STATUS = -10010;
pub const FT_EEPROM_READ_FAILED: SLM_STATUS = -10011;
pub const FT_EEPROM_WRITE_FAILED: SLM_STATUS = -10012;
pub const FT_EEPROM_ERASE_FAILED: SLM_STATUS = -10013;
pub const FT_EEPROM_NOT_PRESENT: SLM_STATUS = -10014;
pub const FT_EEPROM_NOT_PROGRAMMED: SLM_STATUS = -10015;
pub const FT_INVALID_ARGS: SLM_STATUS = -10016;
pub const FT_NOT_SUPPORTED: SLM_STATUS = -10017;
pub const FT_NO_MORE_ITEMS: SLM_STATUS = -10018;
pub const FT_TIMEOUT: SLM_STATUS = -10019;
pub const FT_OPERATION_ABORTED: SLM_STATUS = -10020;
pub const FT_RESERVED_PIPE: SLM_STATUS = -10021;
pub const FT_INVALID_CONTROL_REQUEST_DIRECTION: SLM_STATUS = -10022;
pub const FT_INVALID_CONTROL_REQUEST_TYPE: SLM_STATUS = -10023;
pub const FT_IO_PENDING: SLM_STATUS = -10024;
pub const FT_IO_INCOMPLETE: SLM_STATUS = -10025;
pub const FT_HANDLE_EOF: SLM_STATUS = -10026;
pub const FT_BUSY: SLM_STATUS = -10027;
pub const FT_NO_SYSTEM_RESOURCES: SLM_STATUS = -10028;
pub const FT_DEVICE_LIST_NOT_READY: SLM_STATUS = -10029;
pub const FT_DEVICE_NOT_CONNECTED: SLM_STATUS = -10030;
pub const FT_INCORRECT_DEVICE_PATH: SLM_STATUS = -10031;
pub const FT_OTHER_ERROR: SLM_STATUS = -10032;

// Video modes accepted by SLM_Ctrl_WriteVI
pub const VIDEO_MODE_MEMORY: DWORD = 0;
pub const VIDEO_MODE_DVI: DWORD = 1;

#[cfg(feature = "santec-sdk")]
extern "C" {
    pub fn SLM_Disp_Open(DisplayNumber: DWORD) -> SLM_STATUS;
    pub fn SLM_Disp_Info(DisplayNumber: DWORD, width: *mut USHORT, height: *mut USHORT) -> SLM_STATUS;
    pub fn SLM_Disp_GrayScale(DisplayNumber: DWORD, Flags: DWORD, GrayScale: USHORT) -> SLM_STATUS;
    pub fn SLM_Disp_Close(DisplayNumber: DWORD) -> SLM_STATUS;
    pub fn SLM_Disp_Data(
        DisplayNumber: DWORD,
        width: USHORT,
        height: USHORT,
        Flags: DWORD,
        data: *const USHORT,
    ) -> SLM_STATUS;
    pub fn SLM_Disp_ReadBMP(DisplayNumber: DWORD, Flags: DWORD, FileName: *const WCHAR) -> SLM_STATUS;
    pub fn SLM_Disp_ReadCSV(DisplayNumber: DWORD, Flags: DWORD, FileName: *const WCHAR) -> SLM_STATUS;

    pub fn SLM_Ctrl_Open(SLMNumber: DWORD) -> SLM_STATUS;
    pub fn SLM_Ctrl_ReadSU(SLMNumber: DWORD) -> SLM_STATUS;
    pub fn SLM_Ctrl_WriteVI(SLMNumber: DWORD, mode: DWORD) -> SLM_STATUS;
    pub fn SLM_Ctrl_ReadVI(SLMNumber: DWORD, mode: *mut DWORD) -> SLM_STATUS;
    pub fn SLM_Ctrl_WriteWL(SLMNumber: DWORD, wavelength: DWORD, phase: DWORD) -> SLM_STATUS;
    pub fn SLM_Ctrl_ReadWL(SLMNumber: DWORD, wavelength: *mut DWORD, phase: *mut DWORD) -> SLM_STATUS;
    pub fn SLM_Ctrl_WriteAW(SLMNumber: DWORD) -> SLM_STATUS;
    pub fn SLM_Ctrl_Close(SLMNumber: DWORD) -> SLM_STATUS;
}

#[cfg(not(feature = "santec-sdk"))]
mod dummy {
    use super::*;

    pub unsafe extern "C" fn SLM_Disp_Open(_DisplayNumber: DWORD) -> SLM_STATUS {
        SLM_INVAID_MONITOR
    }

    pub unsafe extern "C" fn SLM_Disp_Info(
        _DisplayNumber: DWORD,
        _width: *mut USHORT,
        _height: *mut USHORT,
    ) -> SLM_STATUS {
        SLM_NOT_OPEN_MONITOR
    }

    pub unsafe extern "C" fn SLM_Disp_GrayScale(
        _DisplayNumber: DWORD,
        _Flags: DWORD,
        _GrayScale: USHORT,
    ) -> SLM_STATUS {
        SLM_NOT_OPEN_MONITOR
    }

    pub unsafe extern "C" fn SLM_Disp_Close(_DisplayNumber: DWORD) -> SLM_STATUS {
        SLM_NOT_OPEN_MONITOR
    }

    pub unsafe extern "C" fn SLM_Disp_Data(
        _DisplayNumber: DWORD,
        _width: USHORT,
        _height: USHORT,
        _Flags: DWORD,
        _data: *const USHORT,
    ) -> SLM_STATUS {
        SLM_NOT_OPEN_MONITOR
    }

    pub unsafe extern "C" fn SLM_Disp_ReadBMP(
        _DisplayNumber: DWORD,
        _Flags: DWORD,
        _FileName: *const WCHAR,
    ) -> SLM_STATUS {
        SLM_NOT_OPEN_MONITOR
    }

    pub unsafe extern "C" fn SLM_Disp_ReadCSV(
        _DisplayNumber: DWORD,
        _Flags: DWORD,
        _FileName: *const WCHAR,
    ) -> SLM_STATUS {
        SLM_NOT_OPEN_MONITOR
    }

    pub unsafe extern "C" fn SLM_Ctrl_Open(_SLMNumber: DWORD) -> SLM_STATUS {
        FT_DEVICE_NOT_FOUND
    }

    pub unsafe extern "C" fn SLM_Ctrl_ReadSU(_SLMNumber: DWORD) -> SLM_STATUS {
        SLM_NOT_OPEN_USB
    }

    pub unsafe extern "C" fn SLM_Ctrl_WriteVI(_SLMNumber: DWORD, _mode: DWORD) -> SLM_STATUS {
        SLM_NOT_OPEN_USB
    }

    pub unsafe extern "C" fn SLM_Ctrl_ReadVI(_SLMNumber: DWORD, _mode: *mut DWORD) -> SLM_STATUS {
        SLM_NOT_OPEN_USB
    }

    pub unsafe extern "C" fn SLM_Ctrl_WriteWL(
        _SLMNumber: DWORD,
        _wavelength: DWORD,
        _phase: DWORD,
    ) -> SLM_STATUS {
        SLM_NOT_OPEN_USB
    }

    pub unsafe extern "C" fn SLM_Ctrl_ReadWL(
        _SLMNumber: DWORD,
        _wavelength: *mut DWORD,
        _phase: *mut DWORD,
    ) -> SLM_STATUS {
        SLM_NOT_OPEN_USB
    }

    pub unsafe extern "C" fn SLM_Ctrl_WriteAW(_SLMNumber: DWORD) -> SLM_STATUS {
        SLM_NOT_OPEN_USB
    }

    pub unsafe extern "C" fn SLM_Ctrl_Close(_SLMNumber: DWORD) -> SLM_STATUS {
        SLM_NOT_OPEN_USB
    }
}

#[cfg(not(feature = "santec-sdk"))]
pub use dummy::*;
