use std::ffi::CStr;

use crate::fmi2 as binding;

fn lossy_str<'a>(ptr: binding::fmi2String, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        fallback.into()
    } else {
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy()
    }
}

/// This function gets called from logger.c once the variadic message has been formatted.
#[no_mangle]
extern "C" fn callback_log(
    _component_environment: binding::fmi2ComponentEnvironment,
    instance_name: binding::fmi2String,
    status: binding::fmi2Status,
    category: binding::fmi2String,
    message: binding::fmi2String,
) {
    let level = match status {
        binding::fmi2Status_fmi2OK => log::Level::Info,
        binding::fmi2Status_fmi2Warning => log::Level::Warn,
        binding::fmi2Status_fmi2Discard => log::Level::Trace,
        binding::fmi2Status_fmi2Error | binding::fmi2Status_fmi2Fatal => log::Level::Error,
        _ => log::Level::Debug,
    };

    let instance_name = lossy_str(instance_name, "NULL");
    let category = lossy_str(category, "");
    let message = lossy_str(message, "");

    log::logger().log(
        &log::Record::builder()
            .args(format_args!("[{category}] {message}"))
            .level(level)
            .module_path(Some("fmi2"))
            .target(instance_name.as_ref())
            .build(),
    );
}

extern "C" {
    /// Implemented in logger.c: formats the message with `vsnprintf` and hands it to
    /// [`callback_log`].
    /// Note: This can be re-implemented in pure Rust once the `c_variadic` feature stabilizes.
    pub fn callback_logger_handler(
        componentEnvironment: binding::fmi2ComponentEnvironment,
        instanceName: binding::fmi2String,
        status: binding::fmi2Status,
        category: binding::fmi2String,
        message: binding::fmi2String,
        ...
    );
}
