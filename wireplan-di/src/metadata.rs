//! Descriptions of implementation types as extracted by an external semantic front-end. The
//! compiler never inspects source code directly - everything it knows about a type comes from a
//! [TypeDescriptor].

use crate::types::{Accessibility, Location, Substitution, Tag, TypeRef};

/// Constant value passed to an attribute constructor.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum AttributeValue {
    Int(i64),
    Str(String),
    Type(TypeRef),
}

impl AttributeValue {
    pub(crate) fn as_ordinal(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn as_tag(&self) -> Option<Tag> {
        match self {
            AttributeValue::Int(value) => Some(Tag::Named(value.to_string())),
            AttributeValue::Str(value) => Some(Tag::Named(value.clone())),
            AttributeValue::Type(_) => None,
        }
    }

    pub(crate) fn as_type(&self) -> Option<&TypeRef> {
        match self {
            AttributeValue::Type(ty) => Some(ty),
            _ => None,
        }
    }
}

/// A single attribute applied to a member.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct AttributeUsage {
    pub attribute_type: TypeRef,
    pub args: Vec<AttributeValue>,
}

impl AttributeUsage {
    pub fn new(attribute_type: TypeRef, args: impl IntoIterator<Item = AttributeValue>) -> Self {
        Self {
            attribute_type,
            args: args.into_iter().collect(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParameterDescriptor {
    pub name: String,
    pub ty: TypeRef,
    /// Parameters with a default value can be left unresolved.
    pub has_default: bool,
    pub attributes: Vec<AttributeUsage>,
}

impl ParameterDescriptor {
    pub fn new<T: Into<String>>(name: T, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            has_default: false,
            attributes: vec![],
        }
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeUsage) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn substitute(&self, substitution: &Substitution) -> Self {
        Self {
            ty: self.ty.substitute(substitution),
            ..self.clone()
        }
    }
}

/// Constructor or ordinary method.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct MethodDescriptor {
    pub name: String,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub parameters: Vec<ParameterDescriptor>,
    pub attributes: Vec<AttributeUsage>,
}

impl MethodDescriptor {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            accessibility: Accessibility::Public,
            is_static: false,
            parameters: vec![],
            attributes: vec![],
        }
    }

    /// Creates a public constructor with given parameters.
    pub fn constructor(parameters: impl IntoIterator<Item = ParameterDescriptor>) -> Self {
        Self {
            parameters: parameters.into_iter().collect(),
            ..Self::new(".ctor")
        }
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeUsage) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn substitute(&self, substitution: &Substitution) -> Self {
        Self {
            parameters: self
                .parameters
                .iter()
                .map(|parameter| parameter.substitute(substitution))
                .collect(),
            ..self.clone()
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub is_read_only: bool,
    pub is_required: bool,
    pub attributes: Vec<AttributeUsage>,
}

impl FieldDescriptor {
    pub fn new<T: Into<String>>(name: T, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            accessibility: Accessibility::Public,
            is_static: false,
            is_read_only: false,
            is_required: false,
            attributes: vec![],
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeUsage) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn substitute(&self, substitution: &Substitution) -> Self {
        Self {
            ty: self.ty.substitute(substitution),
            ..self.clone()
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct PropertyDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub has_setter: bool,
    /// Init-only setters must be supplied at construction, just like required properties.
    pub is_init_only: bool,
    pub is_required: bool,
    pub attributes: Vec<AttributeUsage>,
}

impl PropertyDescriptor {
    pub fn new<T: Into<String>>(name: T, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            accessibility: Accessibility::Public,
            is_static: false,
            has_setter: true,
            is_init_only: false,
            is_required: false,
            attributes: vec![],
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn init_only(mut self) -> Self {
        self.is_init_only = true;
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeUsage) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn substitute(&self, substitution: &Substitution) -> Self {
        Self {
            ty: self.ty.substitute(substitution),
            ..self.clone()
        }
    }
}

/// Everything known about an implementation type.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct TypeDescriptor {
    pub ty: TypeRef,
    pub is_abstract: bool,
    pub constructors: Vec<MethodDescriptor>,
    pub methods: Vec<MethodDescriptor>,
    pub fields: Vec<FieldDescriptor>,
    pub properties: Vec<PropertyDescriptor>,
    pub base_types: Vec<TypeRef>,
}

impl TypeDescriptor {
    /// Creates a descriptor of a type with a single public parameterless constructor.
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            is_abstract: false,
            constructors: vec![MethodDescriptor::constructor([])],
            methods: vec![],
            fields: vec![],
            properties: vec![],
            base_types: vec![],
        }
    }

    pub fn abstract_type(ty: TypeRef) -> Self {
        Self {
            is_abstract: true,
            constructors: vec![],
            ..Self::new(ty)
        }
    }

    /// Replaces all constructors with given ones.
    pub fn with_constructors(
        mut self,
        constructors: impl IntoIterator<Item = MethodDescriptor>,
    ) -> Self {
        self.constructors = constructors.into_iter().collect();
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_base_type(mut self, base_type: TypeRef) -> Self {
        self.base_types.push(base_type);
        self
    }

    pub(crate) fn substitute(&self, substitution: &Substitution) -> Self {
        Self {
            ty: self.ty.substitute(substitution),
            is_abstract: self.is_abstract,
            constructors: self
                .constructors
                .iter()
                .map(|constructor| constructor.substitute(substitution))
                .collect(),
            methods: self
                .methods
                .iter()
                .map(|method| method.substitute(substitution))
                .collect(),
            fields: self
                .fields
                .iter()
                .map(|field| field.substitute(substitution))
                .collect(),
            properties: self
                .properties
                .iter()
                .map(|property| property.substitute(substitution))
                .collect(),
            base_types: self
                .base_types
                .iter()
                .map(|ty| ty.substitute(substitution))
                .collect(),
        }
    }
}

/// Role an attribute plays during node building.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AttributeRole {
    /// Marks injection order and selects constructors/optional members.
    Ordinal,
    /// Overrides the injected contract type.
    Type,
    /// Selects a tagged binding.
    Tag,
}

/// Declares that usages of `attribute_type` carry the value for `role` at `argument_position`.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct AttributeSpec {
    pub role: AttributeRole,
    pub attribute_type: TypeRef,
    pub argument_position: usize,
    pub location: Location,
}

impl AttributeSpec {
    pub fn new(role: AttributeRole, attribute_type: TypeRef) -> Self {
        Self {
            role,
            attribute_type,
            argument_position: 0,
            location: Default::default(),
        }
    }

    pub fn with_argument_position(mut self, argument_position: usize) -> Self {
        self.argument_position = argument_position;
        self
    }
}
