#![no_main]
use libfuzzer_sys::fuzz_target;
use vpack::{Slice, ValueType, MAX_DEPTH};

fn walk(s: Slice, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    let _ = s.byte_size();
    match s.value_type() {
        ValueType::Array => {
            if let Ok(iter) = s.array_iter() {
                for item in iter.flatten() {
                    walk(item, depth + 1);
                }
            }
        }
        ValueType::Object => {
            if let Ok(iter) = s.object_iter() {
                for (key, value) in iter.flatten() {
                    let _ = key.make_key();
                    walk(value, depth + 1);
                }
            }
            let _ = s.get("a");
        }
        ValueType::String => {
            let _ = s.get_string();
        }
        ValueType::Binary => {
            let _ = s.get_binary();
        }
        _ => {
            let _ = s.get_integer();
            let _ = s.get_double();
        }
    }
}

fuzz_target!(|data: &[u8]| {
    walk(Slice::new(data), 0);
    let _ = vpack::Value::from_slice(Slice::new(data));
});
