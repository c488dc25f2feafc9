//! Splunk endpoint URL builders

/// Name of the HEC input created for this tool
pub const HEC_INPUT_NAME: &str = "evtx2splunk";

/// HEC inputs collection, also used as the connectivity probe
pub fn hec_inputs_url(base_url: &str) -> String {
    format!("{}/services/data/inputs/http", base_url)
}

/// The HEC input owned by this tool
pub fn hec_input_url(base_url: &str) -> String {
    format!("{}/services/data/inputs/http/{}", base_url, HEC_INPUT_NAME)
}

/// Index collection
pub fn indexes_url(base_url: &str) -> String {
    format!("{}/services/data/indexes", base_url)
}

/// A single index
pub fn index_url(base_url: &str, index: &str) -> String {
    format!("{}/services/data/indexes/{}", base_url, index)
}

/// HEC event submission endpoint
pub fn collector_event_url(hec_base_url: &str) -> String {
    format!("{}/services/collector/event", hec_base_url)
}
