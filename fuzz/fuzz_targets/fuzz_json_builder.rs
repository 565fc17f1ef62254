#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The lenient builder accepts any JSON value and must always render.
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        let doc = facturae::facturae::FacturaeDocument::from_json(&value);
        assert!(facturae::facturae::to_facturae_xml(&doc).is_ok());
    }
});
