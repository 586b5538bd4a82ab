#![no_main]

use guardrail_policy_engine::policy::PolicyLoader;
use guardrail_policy_engine::yaml::YamlRuleBackend;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary rule text must only ever produce a load error, never a panic.
    let loader = PolicyLoader::new(YamlRuleBackend);
    let _ = loader.load_sources(&[("fuzz.yaml", data)]);
});
