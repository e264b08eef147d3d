//! `heapscope inspect`: decode one object from an image.

use std::path::Path;

use anyhow::{bail, Context};
use heapscope_engine::{describe, OopHandle, TargetSession};

use super::load_image;

/// Options for `heapscope inspect`
#[derive(Debug, Clone)]
pub struct InspectOptions {
    /// Address of the object, hex with `0x` prefix or decimal
    pub address: String,
    /// Include header pseudo-fields in the dump
    pub include_vm_fields: bool,
}

pub fn execute(image_path: &Path, options: &InspectOptions) -> anyhow::Result<String> {
    let handle = OopHandle::from_raw(parse_address(&options.address)?);
    let image = load_image(image_path)?;

    let session = TargetSession::new();
    session
        .on_target_ready(&image)
        .with_context(|| format!("capturing layout from {}", image_path.display()))?;
    let heap = session.object_heap(&image, &image)?;

    let oop = heap
        .resolve(handle)
        .with_context(|| format!("resolving object at {}", handle))?;
    let text = describe(&oop, options.include_vm_fields)
        .with_context(|| format!("decoding {}", oop.structural_value()))?;

    session.on_detach();
    Ok(text)
}

/// Parse `0x`-prefixed hex or plain decimal
pub fn parse_address(text: &str) -> anyhow::Result<u64> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse::<u64>(),
    };
    let address = parsed.with_context(|| format!("invalid address '{}'", text))?;
    if address == 0 {
        bail!("address must not be null");
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x10000").unwrap(), 0x10000);
        assert_eq!(parse_address("0X7f_0000").unwrap(), 0x7f_0000);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert_eq!(parse_address(" 0x10 ").unwrap(), 0x10);
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert!(parse_address("0xzz").is_err());
        assert!(parse_address("ten").is_err());
        assert!(parse_address("0").is_err());
        assert!(parse_address("").is_err());
    }
}
