/// Actions typed as slash commands in the SMART/VISION input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Show help message
    Help,
    /// Load an image file into VISION
    OpenImage {
        path: String,
    },
    /// Use the clipboard image
    PasteImage,
    /// Capture a frame from the live camera
    Capture,
    /// Drop the captured image
    DiscardImage,
    /// Re-acquire the camera
    RestartCamera,
    /// Show or hide the history sidebar
    ToggleHistory,
    /// Quit application
    Quit,
}
