#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = vpack::from_slice::<vpack::Value>(data) {
        let encoded = vpack::to_vec(&value).unwrap();
        let again: vpack::Value = vpack::from_slice(&encoded).unwrap();
        assert_eq!(encoded, vpack::to_vec(&again).unwrap());
    }
});
