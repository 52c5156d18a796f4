#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary metadata must either normalize or fail with ParseError
    if let Ok(workflow) = runlens::metadata::normalize(data) {
        let _ = runlens::preemption::analyze_workflow(&workflow);
        let tree = runlens::call_tree::build_call_tree(&workflow);
        let _ = tree.render_outline();
    }
});
