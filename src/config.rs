use crate::search::pexels::PexelsConfig;
use crate::search::vimeo::VimeoConfig;
use crate::search::youtube::YoutubeConfig;

/// Per-platform settings taken from the environment.
///
/// | Variable | Used by |
/// |---|---|
/// | `PEXELS_API_KEY` | pexels |
/// | `VIDSCOUT_PEXELS_BASE_URL` | pexels |
/// | `VIDSCOUT_YTDLP_BIN`, `VIDSCOUT_YTDLP_ARGS` | youtube |
/// | `VIDSCOUT_YTDLP_COOKIES_FROM_BROWSER` | youtube |
/// | `VIDSCOUT_DDG_BASE_URL` | vimeo |
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub youtube: YoutubeConfig,
    pub vimeo: VimeoConfig,
    pub pexels: PexelsConfig,
}

impl SearchConfig {
    pub fn from_env() -> Self {
        Self {
            youtube: YoutubeConfig::from_env(),
            vimeo: VimeoConfig::from_env(),
            pexels: PexelsConfig::from_env(),
        }
    }
}
