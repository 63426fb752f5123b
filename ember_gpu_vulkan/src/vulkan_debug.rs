/// Validation layer messages routed into the engine logger

use ash::vk;
use ember_gpu::ember::log::LogSeverity;
use ember_gpu::ember::{DebugSeverity, Engine};
use std::ffi::CStr;
use std::sync::Mutex;

/// Severity filter applied by the callback (None = messages dropped)
static DEBUG_FILTER: Mutex<Option<DebugSeverity>> = Mutex::new(None);

/// Start forwarding validation messages at `severity` and above
pub(crate) fn enable_debug_messages(severity: DebugSeverity) {
    if let Ok(mut filter) = DEBUG_FILTER.lock() {
        *filter = Some(severity);
    }
}

/// Stop forwarding; called before the messenger is destroyed
pub(crate) fn disable_debug_messages() {
    if let Ok(mut filter) = DEBUG_FILTER.lock() {
        *filter = None;
    }
}

/// Messenger severity flags matching `severity`
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// Engine log severity of a validation message
pub(crate) fn log_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Debug
    } else {
        LogSeverity::Trace
    }
}

/// Vulkan debug messenger callback
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let filter = match DEBUG_FILTER.lock() {
        Ok(filter) => *filter,
        Err(_) => None,
    };
    let Some(filter) = filter else {
        return vk::FALSE;
    };
    if !severity_flags(filter).intersects(message_severity) {
        return vk::FALSE;
    }

    let message = unsafe {
        if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
            "No message".to_string()
        } else {
            CStr::from_ptr((*p_callback_data).p_message).to_string_lossy().into_owned()
        }
    };

    Engine::log(
        log_severity(message_severity),
        "ember::vulkan",
        format!("[{:?}] {}", message_type, message),
    );

    // Never abort the call that triggered the message
    vk::FALSE
}
