#![no_main]

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use remote_marshal::{MarshalRegistry, Marshaller};
use std::sync::Arc;

static REGISTRY: Lazy<Arc<MarshalRegistry>> =
    Lazy::new(|| Arc::new(MarshalRegistry::with_available_codecs()));

// Every decoder must reject hostile input, never panic.
fuzz_target!(|data: &[u8]| {
    for codec in ["literal", "json", "compact", "binary"] {
        if let Ok(marshaller) = Marshaller::for_codec(codec, REGISTRY.clone()) {
            let _ = marshaller.loads(data);
            let _ = marshaller.loads_call(data);
            let _ = marshaller.deserialize_data(data, true);
        }
    }
});
