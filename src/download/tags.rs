use std::fs::File;
use std::path::Path;

use lofty::config::WriteOptions;
use lofty::error::LoftyError;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::*;
use lofty::tag::{ItemKey, ItemValue, Tag, TagItem};
use thiserror::Error;

use crate::library::Track;

#[derive(Debug, Error)]
pub(super) enum TagError {
    #[error(transparent)]
    Lofty(#[from] LoftyError),
    #[error("cannot read cover {}: {source}", path.display())]
    Cover {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file format has no writable tag")]
    NoTag,
}

/// Replace the artist items with one `TrackArtist` per artist.
pub(super) fn set_artists(tag: &mut Tag, artists: &[String]) {
    tag.retain(|item| !matches!(item.key(), ItemKey::TrackArtist));
    for artist in artists {
        tag.push(TagItem::new(
            ItemKey::TrackArtist,
            ItemValue::Text(artist.clone()),
        ));
    }
}

/// Write title, artists, album and (optionally) the front cover into `path`.
pub(super) fn write_tags(path: &Path, track: &Track, cover: Option<&Path>) -> Result<(), TagError> {
    let mut tagged = lofty::read_from_path(path)?;

    if tagged.primary_tag().is_none() && tagged.first_tag().is_none() {
        let tag_type = tagged.primary_tag_type();
        tagged.insert_tag(Tag::new(tag_type));
    }
    let tag = if tagged.primary_tag().is_some() {
        tagged.primary_tag_mut()
    } else {
        tagged.first_tag_mut()
    };
    let Some(tag) = tag else {
        return Err(TagError::NoTag);
    };

    tag.set_title(track.title.clone());
    set_artists(tag, &track.artists);
    tag.set_album(track.album.clone());

    if let Some(cover) = cover {
        let mut file = File::open(cover).map_err(|source| TagError::Cover {
            path: cover.to_path_buf(),
            source,
        })?;
        let mut picture = Picture::from_reader(&mut file)?;
        picture.set_pic_type(PictureType::CoverFront);
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(picture);
    }

    tag.save_to_path(path, WriteOptions::default())?;
    Ok(())
}
