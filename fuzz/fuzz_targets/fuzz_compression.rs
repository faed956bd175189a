#![no_main]

use libfuzzer_sys::fuzz_target;
use remote_marshal::utils::compression::{
    compress, decompress, CompressionKind, CompressionPolicy, DEFAULT_ZSTD_LEVEL,
};

fuzz_target!(|data: &[u8]| {
    for kind in [CompressionKind::Lz4, CompressionKind::Zstd] {
        if let Ok(compressed) = compress(data, kind, DEFAULT_ZSTD_LEVEL) {
            let restored = decompress(&compressed, kind);
            assert_eq!(restored.ok().as_deref(), Some(data));
        }

        // Raw input must never panic or exceed the size cap
        let _ = decompress(data, kind);

        let policy = CompressionPolicy {
            kind,
            ..CompressionPolicy::default()
        };
        if let Ok((out, compressed)) = policy.apply(data.to_vec(), true) {
            assert!(out.len() <= data.len());
            if let Ok(back) = policy.restore(&out, compressed) {
                assert_eq!(back.as_ref(), data);
            }
        }
    }
});
