/// Sound output seen by the game. Sample and music names are asset paths.
pub trait Audio {
    fn play_sample(&mut self, name: &str);
    fn play_music(&mut self, path: &str, looping: bool);
    fn stop_music(&mut self);
    fn music_path(&self) -> Option<&str>;
    fn set_music_volume(&mut self, volume: f32);
    fn music_volume(&self) -> f32;

    /// Stops the default voice while drawing is halted.
    fn suspend(&mut self);
    fn resume(&mut self);
}

/// Audio backend that produces no sound but keeps the observable state.
#[derive(Debug)]
pub struct SilentAudio {
    music: Option<String>,
    volume: f32,
    suspended: bool,
    pub samples_played: Vec<String>,
}

impl SilentAudio {
    pub fn new() -> Self {
        Self {
            music: None,
            volume: 1.0,
            suspended: false,
            samples_played: Vec::new(),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}

impl Default for SilentAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl Audio for SilentAudio {
    fn play_sample(&mut self, name: &str) {
        log::debug!("sample: {name}");
        self.samples_played.push(name.to_string());
    }

    fn play_music(&mut self, path: &str, looping: bool) {
        log::debug!("music: {path} (loop: {looping})");
        self.music = Some(path.to_string());
    }

    fn stop_music(&mut self) {
        self.music = None;
    }

    fn music_path(&self) -> Option<&str> {
        self.music.as_deref()
    }

    fn set_music_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn music_volume(&self) -> f32 {
        self.volume
    }

    fn suspend(&mut self) {
        self.suspended = true;
    }

    fn resume(&mut self) {
        self.suspended = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn music_volume_is_clamped() {
        let mut audio = SilentAudio::new();
        audio.set_music_volume(-3.0);
        assert_eq!(audio.music_volume(), 0.0);
        audio.set_music_volume(7.0);
        assert_eq!(audio.music_volume(), 1.0);
    }

    #[test]
    fn suspend_and_resume_toggle_voice() {
        let mut audio = SilentAudio::new();
        audio.suspend();
        assert!(audio.is_suspended());
        audio.resume();
        assert!(!audio.is_suspended());
    }
}
