pub mod history {

    pub const DEFAULT_RECENT_LIMIT: usize = 5;

    /// Text prompts longer than this are shortened in history labels.
    pub const LABEL_MAX_CHARS: usize = 50;
}

pub mod session {

    pub const STATE_KEY: &str = "voxgate.session";
}

pub mod audio {

    pub const OUTPUT_MIME: &str = "audio/mpeg";

    pub const ACCEPTED_UPLOAD_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a"];
}

pub mod provider {

    pub const USER_AGENT: &str = "Voxgate/1.0";

    pub const API_KEY_HEADER: &str = "xi-api-key";
}
