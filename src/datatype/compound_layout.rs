use std::ops::Range;

use thiserror::Error;

use super::Datatype;

/// A named member of a [`CompoundLayout`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompoundMember {
    name: String,
    offset: usize,
    datatype: Datatype,
}

impl CompoundMember {
    /// The member name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The byte offset of the member within the compound.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The member datatype.
    #[must_use]
    pub const fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// The byte range of the member within the compound.
    #[must_use]
    pub fn byte_range(&self) -> Range<usize> {
        self.offset..self.offset.saturating_add(self.datatype.size())
    }
}

/// The physical layout of a compound datatype.
///
/// Members keep their declaration order, which need not match their offset order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompoundLayout {
    size: usize,
    members: Vec<CompoundMember>,
}

/// A compound layout error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CompoundLayoutError {
    /// A compound with no members.
    #[error("a compound must have at least one member")]
    Empty,
    /// Two members with the same name.
    #[error("duplicate compound member {0}")]
    DuplicateMember(String),
    /// A member that is itself a compound, without [`CompoundLayoutBuilder::allow_nested`].
    #[error("compound member {0} is a compound")]
    NestedCompound(String),
    /// A member that ends beyond the compound size.
    #[error("compound member {member} ends at byte {end} beyond the compound size {size}")]
    MemberOutOfBounds {
        /// The member name.
        member: String,
        /// The end byte of the member.
        end: usize,
        /// The compound size.
        size: usize,
    },
    /// Two members with overlapping byte ranges.
    #[error("compound members {0} and {1} overlap")]
    OverlappingMembers(String, String),
}

impl CompoundLayout {
    /// Create a new [`CompoundLayoutBuilder`].
    #[must_use]
    pub fn builder() -> CompoundLayoutBuilder {
        CompoundLayoutBuilder::default()
    }

    /// The size of the compound in bytes, including any padding.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The members in declaration order.
    #[must_use]
    pub fn members(&self) -> &[CompoundMember] {
        &self.members
    }

    /// Returns the member with `name`.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&CompoundMember> {
        self.members.iter().find(|member| member.name == name)
    }

    /// The alignment of the compound, the largest member alignment.
    #[must_use]
    pub fn alignment(&self) -> usize {
        self.members
            .iter()
            .map(|member| member.datatype.alignment())
            .max()
            .unwrap_or(1)
    }

    /// Returns true if no member is a compound.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        !self.members.iter().any(|member| member.datatype.is_compound())
    }
}

impl core::fmt::Display for CompoundLayout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "compound{{{}}}",
            itertools::join(
                self.members.iter().map(|member| format!(
                    "{}: {} @ {}",
                    member.name, member.datatype, member.offset
                )),
                ", "
            )
        )
    }
}

const fn align_up(offset: usize, alignment: usize) -> Option<usize> {
    offset.div_ceil(alignment).checked_mul(alignment)
}

/// A [`CompoundLayout`] builder.
///
/// Members added with [`member`](CompoundLayoutBuilder::member) are placed at the next offset satisfying their alignment, as a C compiler would lay out a struct.
/// Members added with [`member_at`](CompoundLayoutBuilder::member_at) are placed at an explicit offset.
#[derive(Debug, Default)]
pub struct CompoundLayoutBuilder {
    members: Vec<(String, Option<usize>, Datatype)>,
    size: Option<usize>,
    allow_nested: bool,
}

impl CompoundLayoutBuilder {
    /// Append a member at the next aligned offset.
    pub fn member(&mut self, name: impl Into<String>, datatype: Datatype) -> &mut Self {
        self.members.push((name.into(), None, datatype));
        self
    }

    /// Append a member at an explicit byte `offset`.
    pub fn member_at(
        &mut self,
        name: impl Into<String>,
        offset: usize,
        datatype: Datatype,
    ) -> &mut Self {
        self.members.push((name.into(), Some(offset), datatype));
        self
    }

    /// Set an explicit compound size in bytes.
    ///
    /// By default, the size is the end of the last member rounded up to the compound alignment.
    pub fn size(&mut self, size: usize) -> &mut Self {
        self.size = Some(size);
        self
    }

    /// Permit members that are themselves compounds.
    ///
    /// Such layouts can be stored, but they cannot be marshaled through a container or parsed dynamically.
    pub fn allow_nested(&mut self) -> &mut Self {
        self.allow_nested = true;
        self
    }

    /// Build the [`CompoundLayout`].
    ///
    /// # Errors
    /// Returns a [`CompoundLayoutError`] if the layout is empty, has duplicate or overlapping members, has a member beyond an explicit size, or has a nested compound that is not permitted.
    pub fn build(&self) -> Result<CompoundLayout, CompoundLayoutError> {
        if self.members.is_empty() {
            return Err(CompoundLayoutError::Empty);
        }

        let mut members: Vec<CompoundMember> = Vec::with_capacity(self.members.len());
        let mut cursor = 0;
        for (name, offset, datatype) in &self.members {
            if members.iter().any(|member| &member.name == name) {
                return Err(CompoundLayoutError::DuplicateMember(name.clone()));
            }
            if datatype.is_compound() && !self.allow_nested {
                return Err(CompoundLayoutError::NestedCompound(name.clone()));
            }
            let out_of_bounds = || CompoundLayoutError::MemberOutOfBounds {
                member: name.clone(),
                end: usize::MAX,
                size: self.size.unwrap_or(usize::MAX),
            };
            let offset = match offset {
                Some(offset) => *offset,
                None => align_up(cursor, datatype.alignment()).ok_or_else(out_of_bounds)?,
            };
            if offset.checked_add(datatype.size()).is_none() {
                return Err(out_of_bounds());
            }
            let member = CompoundMember {
                name: name.clone(),
                offset,
                datatype: datatype.clone(),
            };
            let range = member.byte_range();
            if let Some(other) = members.iter().find(|other| {
                let other = other.byte_range();
                range.start < other.end && other.start < range.end
            }) {
                return Err(CompoundLayoutError::OverlappingMembers(
                    other.name.clone(),
                    member.name,
                ));
            }
            cursor = cursor.max(range.end);
            members.push(member);
        }

        let size = if let Some(size) = self.size {
            if let Some(member) = members.iter().find(|member| member.byte_range().end > size) {
                return Err(CompoundLayoutError::MemberOutOfBounds {
                    member: member.name.clone(),
                    end: member.byte_range().end,
                    size,
                });
            }
            size
        } else {
            let alignment = members
                .iter()
                .map(|member| member.datatype.alignment())
                .max()
                .unwrap_or(1);
            align_up(cursor, alignment).ok_or_else(|| CompoundLayoutError::MemberOutOfBounds {
                member: members.last().map(|member| member.name.clone()).unwrap_or_default(),
                end: cursor,
                size: usize::MAX,
            })?
        };

        Ok(CompoundLayout { size, members })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_layout_c_alignment() {
        let layout = CompoundLayout::builder()
            .member("Key", Datatype::INT8)
            .member("Value", Datatype::FLOAT64)
            .build()
            .unwrap();
        assert_eq!(layout.member("Key").unwrap().offset(), 0);
        assert_eq!(layout.member("Value").unwrap().offset(), 8);
        assert_eq!(layout.size(), 16);
        assert_eq!(layout.alignment(), 8);
        assert!(layout.is_flat());
    }

    #[test]
    fn compound_layout_tail_padding() {
        let layout = CompoundLayout::builder()
            .member("a", Datatype::INT32)
            .member("b", Datatype::INT8)
            .build()
            .unwrap();
        assert_eq!(layout.size(), 8);
    }

    #[test]
    fn compound_layout_explicit_offsets() {
        let layout = CompoundLayout::builder()
            .member_at("Z", 16, Datatype::FLOAT64)
            .member_at("X", 0, Datatype::FLOAT64)
            .member_at("Y", 8, Datatype::FLOAT64)
            .build()
            .unwrap();
        assert_eq!(layout.size(), 24);
        assert_eq!(layout.members()[0].name(), "Z");
        assert_eq!(layout.member("Y").unwrap().byte_range(), 8..16);
        assert_eq!(
            layout.to_string(),
            "compound{Z: float64 @ 16, X: float64 @ 0, Y: float64 @ 8}"
        );
    }

    #[test]
    fn compound_layout_invalid() {
        assert_eq!(
            CompoundLayout::builder().build(),
            Err(CompoundLayoutError::Empty)
        );
        assert_eq!(
            CompoundLayout::builder()
                .member("a", Datatype::INT8)
                .member("a", Datatype::INT8)
                .build(),
            Err(CompoundLayoutError::DuplicateMember("a".to_string()))
        );
        assert_eq!(
            CompoundLayout::builder()
                .member_at("a", 0, Datatype::INT32)
                .member_at("b", 2, Datatype::INT32)
                .build(),
            Err(CompoundLayoutError::OverlappingMembers(
                "a".to_string(),
                "b".to_string()
            ))
        );
        assert!(matches!(
            CompoundLayout::builder()
                .member("a", Datatype::INT64)
                .size(4)
                .build(),
            Err(CompoundLayoutError::MemberOutOfBounds { end: 8, size: 4, .. })
        ));
    }

    #[test]
    fn compound_layout_offset_overflow() {
        assert!(matches!(
            CompoundLayout::builder()
                .member_at("a", usize::MAX, Datatype::INT8)
                .build(),
            Err(CompoundLayoutError::MemberOutOfBounds { ref member, .. }) if member == "a"
        ));
        assert!(matches!(
            CompoundLayout::builder()
                .member_at("a", usize::MAX - 1, Datatype::INT8)
                .member("b", Datatype::INT64)
                .build(),
            Err(CompoundLayoutError::MemberOutOfBounds { ref member, .. }) if member == "b"
        ));
    }

    #[test]
    fn compound_layout_nested() {
        let inner = CompoundLayout::builder()
            .member("x", Datatype::FLOAT32)
            .build()
            .unwrap();
        assert_eq!(
            CompoundLayout::builder()
                .member("inner", inner.clone().into())
                .build(),
            Err(CompoundLayoutError::NestedCompound("inner".to_string()))
        );
        let outer = CompoundLayout::builder()
            .member("inner", inner.into())
            .allow_nested()
            .build()
            .unwrap();
        assert!(!outer.is_flat());
        assert_eq!(outer.size(), 4);
    }
}
