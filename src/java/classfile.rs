//! Just enough of the class-file format to find a class's own name, the
//! names of every class it refers to, and the source file it came from.

use std::collections::BTreeSet;

/// Class files begin with this magic number.
const MAGIC: u32 = 0xCAFE_BABE;

/// Malformed class-file payload.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    /// The payload does not start with `0xCAFEBABE`.
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    /// The payload ended in the middle of a structure.
    #[error("truncated class file at offset {0}")]
    Truncated(usize),
    /// A constant pool tag this reader does not know.
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownTag {
        /// tag byte
        tag:   u8,
        /// constant pool index
        index: usize,
    },
    /// A constant pool index pointing at the wrong kind of entry.
    #[error("constant pool index {0} is not a valid reference")]
    BadIndex(u16),
}

/// Names read from one class file, in binary (dotted) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// the class itself, eg. `a.b.Foo$Inner`
    pub this_class: String,
    /// every class named by a `CONSTANT_Class` entry, arrays excluded
    pub references: BTreeSet<String>,
    /// the `SourceFile` attribute, eg. `FooTest.java`
    pub source_file: Option<String>,
}

/// Constant pool entry kinds the reader keeps.
#[derive(Debug, Clone)]
enum Constant {
    /// slot with no interesting content
    Other,
    /// `CONSTANT_Utf8`
    Utf8(String),
    /// `CONSTANT_Class`, index of its name
    Class(u16),
}

/// Big-endian cursor over a byte slice.
struct Reader<'a> {
    /// payload
    bytes: &'a [u8],
    /// current offset
    pos:   usize,
}

impl<'a> Reader<'a> {
    /// Takes the next `n` bytes.
    fn take(&mut self, n: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self.pos.checked_add(n).ok_or(ClassFileError::Truncated(self.pos))?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(ClassFileError::Truncated(self.pos))?;
        self.pos = end;
        Ok(slice)
    }

    /// Reads a `u1`.
    fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a `u2`.
    fn u16(&mut self) -> Result<u16, ClassFileError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Reads a `u4`.
    fn u32(&mut self) -> Result<u32, ClassFileError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Skips an `attributes_count` followed by that many attributes.
fn skip_attributes(r: &mut Reader<'_>) -> Result<(), ClassFileError> {
    let count = r.u16()?;
    for _ in 0..count {
        let _name = r.u16()?;
        let len = r.u32()? as usize;
        r.take(len)?;
    }
    Ok(())
}

/// Parses a whole class file, keeping the names the loader and the
/// compiler care about.
pub fn read_class_info(bytes: &[u8]) -> Result<ClassInfo, ClassFileError> {
    let mut r = Reader { bytes, pos: 0 };
    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(ClassFileError::BadMagic(magic));
    }
    let _minor = r.u16()?;
    let _major = r.u16()?;

    let count = r.u16()? as usize;
    let mut pool = vec![Constant::Other; count.max(1)];
    let mut index = 1;
    while index < count {
        let tag = r.u8()?;
        let mut width = 1;
        pool[index] = match tag {
            1 => {
                let len = r.u16()? as usize;
                // modified UTF-8; lossy is fine for class names
                Constant::Utf8(String::from_utf8_lossy(r.take(len)?).into_owned())
            }
            7 => Constant::Class(r.u16()?),
            3 | 4 => {
                r.take(4)?;
                Constant::Other
            }
            5 | 6 => {
                r.take(8)?;
                width = 2;
                Constant::Other
            }
            8 | 16 | 19 | 20 => {
                r.take(2)?;
                Constant::Other
            }
            9 | 10 | 11 | 12 | 17 | 18 => {
                r.take(4)?;
                Constant::Other
            }
            15 => {
                r.take(3)?;
                Constant::Other
            }
            tag => return Err(ClassFileError::UnknownTag { tag, index }),
        };
        index += width;
    }

    let _access = r.u16()?;
    let this_index = r.u16()?;

    let class_name = |idx: u16| -> Result<String, ClassFileError> {
        match pool.get(idx as usize) {
            Some(Constant::Class(name_idx)) => match pool.get(*name_idx as usize) {
                Some(Constant::Utf8(name)) => Ok(name.replace('/', ".")),
                _ => Err(ClassFileError::BadIndex(*name_idx)),
            },
            _ => Err(ClassFileError::BadIndex(idx)),
        }
    };

    let _super = r.u16()?;
    let interfaces = r.u16()? as usize;
    r.take(interfaces * 2)?;
    // fields, then methods
    for _ in 0..2 {
        let members = r.u16()?;
        for _ in 0..members {
            r.take(6)?;
            skip_attributes(&mut r)?;
        }
    }

    let utf8 = |idx: u16| match pool.get(idx as usize) {
        Some(Constant::Utf8(text)) => Some(text.as_str()),
        _ => None,
    };
    let mut source_file = None;
    let attributes = r.u16()?;
    for _ in 0..attributes {
        let name = r.u16()?;
        let len = r.u32()? as usize;
        let body = r.take(len)?;
        if utf8(name) == Some("SourceFile") && len == 2 {
            let file = u16::from_be_bytes([body[0], body[1]]);
            source_file = Some(utf8(file).ok_or(ClassFileError::BadIndex(file))?.to_string());
        }
    }

    let this_class = class_name(this_index)?;
    let mut references = BTreeSet::new();
    for (idx, constant) in pool.iter().enumerate() {
        if let Constant::Class(name_idx) = constant {
            let Some(Constant::Utf8(name)) = pool.get(*name_idx as usize) else {
                return Err(ClassFileError::BadIndex(idx as u16));
            };
            if name.starts_with('[') {
                continue;
            }
            let name = name.replace('/', ".");
            if name != this_class {
                references.insert(name);
            }
        }
    }

    Ok(ClassInfo {
        this_class,
        references,
        source_file,
    })
}
