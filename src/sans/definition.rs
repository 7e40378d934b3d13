//! Definition messages and the field layouts they declare.

use thiserror::Error;
use zerocopy::FromBytes;

use super::{data::BaseType, header::DefinitionHeader};
use crate::decode::reader::{BinaryReader, Endian, ReadError};

/// An error decoding a definition message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// Ran out of bytes mid-definition.
    #[error(transparent)]
    Read(#[from] ReadError),
    /// A field declared a base type outside the protocol.
    #[error("Unknown base type {base_type:#04x} for field {field}.")]
    UnknownBaseType { field: u8, base_type: u8 },
}

/// Layout of one field within a data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    pub number: u8,
    /// Size of the field in bytes; may span several base-type elements.
    pub size: u8,
    pub base_type: BaseType,
}

/// Layout of one developer field within a data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeveloperFieldDefinition {
    pub number: u8,
    pub size: u8,
    pub developer_data_index: u8,
}

/// The layout of data messages bound to a local message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDefinition {
    pub local_type: u8,
    pub global_message: u16,
    pub endian: Endian,
    pub fields: Vec<FieldDefinition>,
    pub developer_fields: Vec<DeveloperFieldDefinition>,
}

#[repr(C)]
#[derive(FromBytes)]
struct RawDefinition {
    _reserved: u8,
    architecture: u8,
    global_message: [u8; 2],
    fields: u8,
}

#[repr(C)]
#[derive(FromBytes)]
struct RawField {
    number: u8,
    size: u8,
    base_type: u8,
}

impl MessageDefinition {
    /// Decode the body of a definition message following its record header.
    pub fn read(
        r: &mut BinaryReader,
        local_type: u8,
        header: DefinitionHeader,
    ) -> Result<Self, DefinitionError> {
        let RawDefinition {
            architecture,
            global_message,
            fields,
            ..
        } = zerocopy::transmute!(r.read_array::<5>()?);

        let endian = Endian::from_architecture(architecture);
        let global_message = match endian {
            Endian::Little => u16::from_le_bytes(global_message),
            Endian::Big => u16::from_be_bytes(global_message),
        };

        let fields = (0..fields)
            .map(|_| {
                let RawField {
                    number,
                    size,
                    base_type,
                } = zerocopy::transmute!(r.read_array::<3>()?);

                let base_type =
                    BaseType::from_byte(base_type).ok_or(DefinitionError::UnknownBaseType {
                        field: number,
                        base_type,
                    })?;

                Ok(FieldDefinition {
                    number,
                    size,
                    base_type,
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;

        let developer_fields = if header.has_developer_fields {
            let count = r.read_u8(endian)?;
            (0..count)
                .map(|_| {
                    let [number, size, developer_data_index] = r.read_array::<3>()?;
                    Ok(DeveloperFieldDefinition {
                        number,
                        size,
                        developer_data_index,
                    })
                })
                .collect::<Result<Vec<_>, ReadError>>()?
        } else {
            Vec::new()
        };

        Ok(Self {
            local_type,
            global_message,
            endian,
            fields,
            developer_fields,
        })
    }

    /// Total bytes occupied by a data message body of this layout.
    pub fn data_size(&self) -> usize {
        let regular: usize = self.fields.iter().map(|f| f.size as usize).sum();
        let developer: usize = self.developer_fields.iter().map(|f| f.size as usize).sum();
        regular + developer
    }
}
