use crate::http::encode_path_segment;
use serde::{Deserialize, Serialize};

pub const PATH_PHOTO: &str = "/p";
pub const PATH_TAG: &str = "/t";
pub const PATH_CAMERA: &str = "/shot-on";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub url: String,
    pub aspect_ratio: f64,
    #[serde(default)]
    pub blur_data: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Camera {
    pub make: String,
    pub model: String,
}

pub fn title_for_photo(photo: &Photo) -> &str {
    photo
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("Untitled")
}

// "Fujifilm X-T5" -> "fujifilm-x-t5"
fn parameterize(s: &str) -> String {
    encode_path_segment(&s.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase())
}

pub fn path_for_camera(camera: &Camera) -> String {
    format!(
        "{}/{}/{}",
        PATH_CAMERA,
        parameterize(&camera.make),
        parameterize(&camera.model)
    )
}

pub fn path_for_tag(tag: &str) -> String {
    format!("{}/{}", PATH_TAG, encode_path_segment(tag))
}

/// Tag context wins over camera context.
pub fn path_for_photo(photo: &Photo, tag: Option<&str>, camera: Option<&Camera>) -> String {
    let id = encode_path_segment(&photo.id);
    match (tag, camera) {
        (Some(tag), _) => format!("{}/{}", path_for_tag(tag), id),
        (None, Some(camera)) => format!("{}/{}", path_for_camera(camera), id),
        (None, None) => format!("{}/{}", PATH_PHOTO, id),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSmall {
    pub src: String,
    pub aspect_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur_data: Option<String>,
    pub class_name: String,
    pub alt: String,
}

/// Navigable thumbnail: link target, link classes and the image inside it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSmall {
    pub href: String,
    pub class_name: String,
    pub image: ImageSmall,
}

pub fn photo_small(
    photo: &Photo,
    tag: Option<&str>,
    camera: Option<&Camera>,
    selected: bool,
) -> PhotoSmall {
    let mut classes = vec!["active:brightness-75"];
    if selected {
        classes.push("brightness-50");
    }
    PhotoSmall {
        href: path_for_photo(photo, tag, camera),
        class_name: classes.join(" "),
        image: ImageSmall {
            src: photo.url.clone(),
            aspect_ratio: photo.aspect_ratio,
            blur_data: photo.blur_data.clone(),
            class_name: "w-full".into(),
            alt: title_for_photo(photo).to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo() -> Photo {
        Photo {
            id: "abc123".into(),
            url: "https://cdn.example/abc123.jpg".into(),
            aspect_ratio: 1.5,
            blur_data: Some("data:image/jpeg;base64,AAAA".into()),
            title: Some("Harbor at Dusk".into()),
        }
    }

    fn camera() -> Camera {
        Camera {
            make: "Fujifilm".into(),
            model: "X100 V".into(),
        }
    }

    #[test]
    fn plain_path() {
        assert_eq!(path_for_photo(&photo(), None, None), "/p/abc123");
    }

    #[test]
    fn tag_path_and_precedence() {
        assert_eq!(path_for_photo(&photo(), Some("street"), None), "/t/street/abc123");
        assert_eq!(
            path_for_photo(&photo(), Some("new york"), Some(&camera())),
            "/t/new%20york/abc123"
        );
    }

    #[test]
    fn camera_path() {
        assert_eq!(
            path_for_photo(&photo(), None, Some(&camera())),
            "/shot-on/fujifilm/x100-v/abc123"
        );
    }

    #[test]
    fn selected_dims() {
        let s = photo_small(&photo(), None, None, true);
        assert_eq!(s.class_name, "active:brightness-75 brightness-50");
        let u = photo_small(&photo(), None, None, false);
        assert_eq!(u.class_name, "active:brightness-75");
        assert_eq!(u.image.alt, "Harbor at Dusk");
        assert_eq!(u.image.class_name, "w-full");
    }

    #[test]
    fn untitled_fallback() {
        let mut p = photo();
        p.title = Some("   ".into());
        assert_eq!(title_for_photo(&p), "Untitled");
        p.title = None;
        assert_eq!(photo_small(&p, None, None, false).image.alt, "Untitled");
    }
}
