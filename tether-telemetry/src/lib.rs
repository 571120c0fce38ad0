//! Tether Telemetry - Telemetry Decoder
//!
//! Every payload handled here was produced by a remote agent and is
//! untrusted. Decoders return `DecodeResult` for single records; batch
//! helpers drop failing members and keep going.

pub mod device;
pub mod location;
pub mod log;
pub mod source;

pub use device::{decode_device_row, decode_devices};
pub use location::{
    decode_all_locations, decode_all_locations_with, decode_located, decode_location,
    decode_location_with, CoercionPolicy, LocationFix,
};
pub use log::decode_log;
pub use source::BlobSource;
