/// Avatar style used when settings do not name one.
pub const DEFAULT_AVATAR_STYLE: &str = "lorelei";
/// Number of avatars offered on the profile screen.
pub const AVATAR_COUNT: u32 = 7;
const AVATAR_API_BASE: &str = "https://api.dicebear.com/9.x";

/// Builds the generated avatar URL for one seed.
pub fn avatar_url(style: &str, seed: u32) -> String {
    format!("{AVATAR_API_BASE}/{style}/svg?seed={seed}")
}

/// One selectable avatar in the profile gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarOption {
    pub seed: u32,
    pub url: String,
}

impl AvatarOption {
    pub fn from_seed(style: &str, seed: u32) -> Self {
        Self {
            seed,
            url: avatar_url(style, seed),
        }
    }
}

/// Returns the fixed avatar gallery for `style`, seeded `0..AVATAR_COUNT`.
pub fn avatar_gallery(style: &str) -> Vec<AvatarOption> {
    (0..AVATAR_COUNT)
        .map(|seed| AvatarOption::from_seed(style, seed))
        .collect()
}

/// Display name and avatar chosen for this session. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalProfile {
    pub name: String,
    pub avatar_url: String,
}

/// Reason a profile confirmation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileRejection {
    EmptyName,
    NoAvatar,
}

/// Editable profile form state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    name: String,
    gallery: Vec<AvatarOption>,
    selected: Option<usize>,
}

impl ProfileDraft {
    pub fn new(gallery: Vec<AvatarOption>) -> Self {
        Self {
            name: String::new(),
            gallery,
            selected: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn gallery(&self) -> &[AvatarOption] {
        &self.gallery
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_avatar(&self) -> Option<&AvatarOption> {
        self.selected.and_then(|index| self.gallery.get(index))
    }

    /// Marks the avatar at `index` as the candidate. Out-of-range indexes are ignored.
    pub fn select_avatar(&mut self, index: usize) -> bool {
        if index >= self.gallery.len() {
            return false;
        }

        self.selected = Some(index);
        true
    }

    /// Produces the session profile. The name is kept exactly as typed.
    pub fn confirm(&self) -> Result<LocalProfile, ProfileRejection> {
        if self.name.trim().is_empty() {
            return Err(ProfileRejection::EmptyName);
        }

        let avatar = self.selected_avatar().ok_or(ProfileRejection::NoAvatar)?;

        Ok(LocalProfile {
            name: self.name.clone(),
            avatar_url: avatar.url.clone(),
        })
    }
}
