//! `heapscope layout`: print the layout snapshot captured from an image.

use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use heapscope_engine::{NarrowEncoding, TargetSession, VmLayout};

use super::load_image;

pub fn execute(image_path: &Path) -> anyhow::Result<String> {
    let image = load_image(image_path)?;
    let session = TargetSession::new();
    let layout = session
        .on_target_ready(&image)
        .with_context(|| format!("capturing layout from {}", image_path.display()))?;
    Ok(format!("Layout of {}\n{}", image_path.display(), render(&layout)))
}

/// Aligned `label: value` report of a layout snapshot
pub fn render(layout: &VmLayout) -> String {
    let mode = if layout.compact_headers {
        "compact headers"
    } else if layout.compressed_class_pointers {
        "compressed class pointers"
    } else {
        "plain"
    };

    let mut out = String::new();
    let mut row = |label: &str, value: String| {
        let _ = writeln!(out, "{:<18} {}", format!("{}:", label), value);
    };
    row("header mode", mode.to_string());
    row("header size", format!("{} bytes", layout.header_size()));
    if !layout.compact_headers {
        row(
            "type pointer",
            format!("+{}, {} bytes", layout.klass_offset(), layout.klass_slot_size()),
        );
    }
    row("pointer size", format!("{} bytes", layout.pointer_size));
    row("reference size", format!("{} bytes", layout.reference_size()));
    row(
        "narrow klass",
        encoding(layout.compressed_class_pointers, layout.narrow_klass),
    );
    row("narrow oop", encoding(layout.compressed_oops, layout.narrow_oop));
    row("object alignment", format!("{} bytes", layout.object_alignment));
    row(
        "byte order",
        if layout.big_endian { "big-endian" } else { "little-endian" }.to_string(),
    );
    out
}

fn encoding(enabled: bool, encoding: NarrowEncoding) -> String {
    if enabled {
        format!("base {:#x}, shift {}", encoding.base, encoding.shift)
    } else {
        "off".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain() {
        let text = render(&VmLayout::default());
        assert!(text.contains("header mode:       plain"));
        assert!(text.contains("header size:       16 bytes"));
        assert!(text.contains("type pointer:      +8, 8 bytes"));
        assert!(text.contains("narrow oop:        off"));
    }

    #[test]
    fn test_render_compact_omits_type_pointer() {
        let layout = VmLayout {
            compact_headers: true,
            compressed_class_pointers: true,
            narrow_klass: NarrowEncoding {
                base: 0x8_0000_0000,
                shift: 0,
            },
            ..VmLayout::default()
        };
        let text = render(&layout);
        assert!(text.contains("header mode:       compact headers"));
        assert!(text.contains("header size:       8 bytes"));
        assert!(text.contains("narrow klass:      base 0x800000000, shift 0"));
        assert!(!text.contains("type pointer"));
    }
}
